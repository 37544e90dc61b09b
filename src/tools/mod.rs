pub mod checker;
pub mod registry;

pub use checker::ToolChecker;
pub use registry::ToolRegistry;
