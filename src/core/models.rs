use super::errors::BugxError;
use super::state::PipelineState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Input shape a target (or a tool) deals in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    Domain,
    Url,
    File,
    Network,
}

impl fmt::Display for FocusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FocusMode::Domain => "domain",
            FocusMode::Url => "url",
            FocusMode::File => "file",
            FocusMode::Network => "network",
        };
        f.write_str(name)
    }
}

/// Semantic type of what a step writes (and what a consumer accepts).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    HostList,
    UrlList,
    JsonFindings,
    Text,
    Directory,
}

impl ArtifactKind {
    pub fn is_list(&self) -> bool {
        matches!(self, ArtifactKind::HostList | ArtifactKind::UrlList)
    }

    /// File extension used when naming the artifact; `None` for directories.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ArtifactKind::HostList | ArtifactKind::UrlList | ArtifactKind::Text => Some("txt"),
            ArtifactKind::JsonFindings => Some("json"),
            ArtifactKind::Directory => None,
        }
    }
}

/// What a failed or skipped step hands to the next consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Zero-byte placeholder.
    #[default]
    Empty,
    /// The step's own input, unfiltered.
    Passthrough,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    ToolFailure { exit_code: Option<i32> },
    Timeout { after_ms: u128 },
    BinaryNotFound { binary: String },
    Cancelled,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::ToolFailure { .. } => "failed",
            StepStatus::Timeout { .. } => "timeout",
            StepStatus::BinaryNotFound { .. } => "skipped",
            StepStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one tool invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub tool: String,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u128,
    pub command: String,
    pub input: Option<PathBuf>,
    pub artifact: Option<PathBuf>,
    pub output_lines: usize,
    /// Records in the artifact; `None` when the step left no artifact.
    #[serde(default)]
    pub records: Option<usize>,
}

impl RunResult {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms as u64)
    }

    /// The failure as a domain error, for display; `None` on success.
    pub fn error(&self) -> Option<BugxError> {
        match &self.status {
            StepStatus::Success => None,
            StepStatus::ToolFailure { exit_code } => Some(BugxError::ToolFailure {
                tool: self.tool.clone(),
                exit_code: *exit_code,
            }),
            StepStatus::Timeout { after_ms } => Some(BugxError::Timeout {
                tool: self.tool.clone(),
                after: Duration::from_millis(*after_ms as u64),
            }),
            StepStatus::BinaryNotFound { binary } => {
                Some(BugxError::BinaryNotFound(binary.clone()))
            }
            StepStatus::Cancelled => Some(BugxError::Aborted(format!(
                "{} cancelled",
                self.tool
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineResult {
    pub target: String,
    pub slug: String,
    pub run_id: String,
    pub output_dir: PathBuf,
    pub steps: Vec<RunResult>,
    pub elapsed_ms: u128,
    pub state: PipelineState,
}

impl PipelineResult {
    pub fn is_aborted(&self) -> bool {
        matches!(self.state, PipelineState::Aborted { .. })
    }

    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_success()).count()
    }

    pub fn total_records(&self) -> usize {
        self.steps.iter().filter_map(|s| s.records).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: StepStatus) -> RunResult {
        RunResult {
            tool: "nuclei".to_string(),
            status,
            exit_code: None,
            duration_ms: 1500,
            command: "nuclei -l in".to_string(),
            input: None,
            artifact: None,
            output_lines: 0,
            records: None,
        }
    }

    #[test]
    fn test_artifact_extensions() {
        assert_eq!(ArtifactKind::HostList.extension(), Some("txt"));
        assert_eq!(ArtifactKind::JsonFindings.extension(), Some("json"));
        assert_eq!(ArtifactKind::Directory.extension(), None);
        assert!(ArtifactKind::UrlList.is_list());
        assert!(!ArtifactKind::Text.is_list());
    }

    #[test]
    fn test_run_result_error_mapping() {
        assert!(result(StepStatus::Success).error().is_none());

        let err = result(StepStatus::ToolFailure { exit_code: Some(2) })
            .error()
            .unwrap();
        assert!(matches!(err, BugxError::ToolFailure { exit_code: Some(2), .. }));

        let err = result(StepStatus::Timeout { after_ms: 1000 }).error().unwrap();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_total_records_skips_steps_without_artifacts() {
        let mut found = result(StepStatus::Success);
        found.records = Some(4);
        let mut second = result(StepStatus::Success);
        second.records = Some(0);
        let pipeline = PipelineResult {
            target: "example.com".to_string(),
            slug: "example".to_string(),
            run_id: "example-1".to_string(),
            output_dir: PathBuf::from("/r/example"),
            steps: vec![found, result(StepStatus::Cancelled), second],
            elapsed_ms: 10,
            state: PipelineState::Completed,
        };
        assert_eq!(pipeline.total_records(), 4);
        assert_eq!(pipeline.succeeded(), 2);
    }

    #[test]
    fn test_status_serializes_tagged() {
        let json = serde_json::to_string(&StepStatus::ToolFailure { exit_code: Some(1) }).unwrap();
        assert_eq!(json, r#"{"kind":"tool_failure","exit_code":1}"#);
    }
}
