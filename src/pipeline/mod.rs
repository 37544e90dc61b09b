pub mod merge;
pub mod sequencer;
pub mod workflows;

pub use sequencer::{PipelineOptions, PlannedStep, Sequencer};
pub use workflows::{Workflow, WorkflowCatalog, ALL_WORKFLOWS};
