use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BugxError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("invalid target '{raw}': {reason}")]
    InvalidTarget { raw: String, reason: String },

    #[error("binary not found on PATH: {0}")]
    BinaryNotFound(String),

    #[error("{tool} exited with code {exit_code:?}")]
    ToolFailure { tool: String, exit_code: Option<i32> },

    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    #[error("artifact merge failed at {path:?}: {source}")]
    ArtifactMerge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline aborted: {0}")]
    Aborted(String),

    #[error("unknown wordlist: {0}")]
    UnknownWordlist(String),

    #[error("{tool} needs an input list but none was provided")]
    MissingInput { tool: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BugxError {
    pub fn invalid_target(raw: &str, reason: impl Into<String>) -> Self {
        BugxError::InvalidTarget {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    pub fn merge(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BugxError::ArtifactMerge {
            path: path.into(),
            source,
        }
    }

    /// Usage errors are raised before any process is spawned.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            BugxError::UnknownTool(_)
                | BugxError::UnknownWorkflow(_)
                | BugxError::InvalidTarget { .. }
                | BugxError::UnknownWordlist(_)
                | BugxError::InvalidConfig(_)
        )
    }
}

pub type BugxResult<T> = Result<T, BugxError>;
