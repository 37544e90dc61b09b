use serde::{Deserialize, Serialize};

/// Lifecycle of one pipeline run.
///
/// `Pending → Running(i) → {Running(i + 1) | Completed | Aborted}`. Ordinary
/// step failures keep the run in `Running`; only cancellation or an
/// unrecoverable environment error leads to `Aborted`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Pending,
    Running { step: usize },
    Completed,
    Aborted { reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Aborted { .. })
    }

    /// Moves to `Running(step)`. Only `Pending → Running(0)` and
    /// `Running(i) → Running(i + 1)` are legal.
    pub fn advance(&mut self, step: usize) -> bool {
        let legal = match self {
            PipelineState::Pending => step == 0,
            PipelineState::Running { step: current } => step == *current + 1,
            _ => false,
        };
        if legal {
            *self = PipelineState::Running { step };
        } else {
            tracing::warn!("Illegal pipeline transition from {:?} to step {}", self, step);
        }
        legal
    }

    pub fn complete(&mut self) {
        if !self.is_terminal() {
            *self = PipelineState::Completed;
        }
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        if !self.is_terminal() {
            *self = PipelineState::Aborted {
                reason: reason.into(),
            };
        }
    }
}
