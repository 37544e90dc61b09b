use super::models::RunResult;
use super::state::PipelineState;
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Progress emitted by a pipeline run, consumed by the console printer.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StepStarted {
        target: String,
        index: usize,
        total: usize,
        tool: String,
        command: String,
    },
    Output {
        target: String,
        tool: String,
        stream: Stream,
        line: String,
    },
    StepFinished {
        target: String,
        result: RunResult,
    },
    PipelineFinished {
        target: String,
        state: PipelineState,
    },
}

impl PipelineEvent {
    pub fn target(&self) -> &str {
        match self {
            PipelineEvent::StepStarted { target, .. }
            | PipelineEvent::Output { target, .. }
            | PipelineEvent::StepFinished { target, .. }
            | PipelineEvent::PipelineFinished { target, .. } => target,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

/// Sends events for one target; silent when nobody listens.
#[derive(Clone, Debug)]
pub struct Emitter {
    target: String,
    tx: Option<EventSender>,
}

impl Emitter {
    pub fn new(target: impl Into<String>, tx: Option<EventSender>) -> Self {
        Self {
            target: target.into(),
            tx,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            // A closed receiver only means the printer has gone away.
            let _ = tx.send(event);
        }
    }

    pub fn output(&self, tool: &str, stream: Stream, line: String) {
        self.emit(PipelineEvent::Output {
            target: self.target.clone(),
            tool: tool.to_string(),
            stream,
            line,
        });
    }
}
