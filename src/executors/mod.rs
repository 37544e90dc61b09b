pub mod builder;
pub mod env;
pub mod runner;

pub use builder::CommandBuilder;
pub use env::ExecEnv;
