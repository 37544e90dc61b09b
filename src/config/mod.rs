pub mod loader;
pub mod types;
pub mod wordlist;

pub use loader::ConfigLoader;
pub use types::{ExecConfig, FlagMode, GlobalConfig, RunConfig, ToolOverride};
pub use wordlist::WordlistConfig;
