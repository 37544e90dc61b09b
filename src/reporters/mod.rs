pub mod validate;
pub mod writer;

use crate::core::models::PipelineResult;
use anyhow::Result;
use std::path::PathBuf;

/// Writes and checks the summaries for one finished pipeline.
pub fn report(result: &PipelineResult) -> Result<Vec<PathBuf>> {
    let files = writer::write_all(result)?;
    validate::validate_reports(&files)?;
    Ok(files)
}
