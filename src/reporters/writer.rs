use crate::core::models::PipelineResult;
use crate::core::state::PipelineState;
use crate::utils::fs::atomic_write;
use crate::utils::time::format_duration;
use anyhow::{Context, Result};
use minijinja::{context, Environment};
use serde::Serialize;
use std::path::PathBuf;

const SUMMARY_TEMPLATE: &str = include_str!("templates/summary.txt.j2");

pub const SUMMARY_JSON: &str = "summary.json";
pub const SUMMARY_TXT: &str = "summary.txt";

/// Writes both summaries into the target's output directory and returns
/// their paths.
pub fn write_all(result: &PipelineResult) -> Result<Vec<PathBuf>> {
    let json = write_json_summary(result)?;
    let text = write_text_summary(result)?;
    Ok(vec![json, text])
}

/// `summary.json` layout: the pipeline result plus its findings total.
#[derive(Serialize)]
struct JsonSummary<'a> {
    #[serde(flatten)]
    result: &'a PipelineResult,
    findings: usize,
}

fn write_json_summary(result: &PipelineResult) -> Result<PathBuf> {
    let path = result.output_dir.join(SUMMARY_JSON);
    let json = serde_json::to_string_pretty(&JsonSummary {
        result,
        findings: result.total_records(),
    })?;
    atomic_write(&path, json.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn write_text_summary(result: &PipelineResult) -> Result<PathBuf> {
    let path = result.output_dir.join(SUMMARY_TXT);
    let rendered = render_text_summary(result)?;
    atomic_write(&path, rendered.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn render_text_summary(result: &PipelineResult) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("summary.txt", SUMMARY_TEMPLATE)?;
    let template = env.get_template("summary.txt")?;

    let (state, reason) = match &result.state {
        PipelineState::Aborted { reason } => ("aborted", Some(reason.as_str())),
        PipelineState::Completed => ("completed", None),
        PipelineState::Running { .. } => ("running", None),
        PipelineState::Pending => ("pending", None),
    };
    let steps: Vec<_> = result
        .steps
        .iter()
        .map(|step| {
            context! {
                tool => &step.tool,
                status => step.status.label(),
                exit_code => step.exit_code,
                duration => format_duration(step.duration_ms),
                command => &step.command,
                artifact => step.artifact.as_ref().map(|p| p.display().to_string()),
                records => step.records,
            }
        })
        .collect();

    let rendered = template.render(context! {
        version => env!("CARGO_PKG_VERSION"),
        target => &result.target,
        run_id => &result.run_id,
        finished_at => chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        duration => format_duration(result.elapsed_ms),
        state => state,
        reason => reason,
        output_dir => result.output_dir.display().to_string(),
        succeeded => result.succeeded(),
        findings => result.total_records(),
        steps => steps,
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{RunResult, StepStatus};

    fn sample(dir: &std::path::Path) -> PipelineResult {
        PipelineResult {
            target: "example.com".to_string(),
            slug: "example".to_string(),
            run_id: "run_example_test".to_string(),
            output_dir: dir.to_path_buf(),
            steps: vec![
                RunResult {
                    tool: "subfinder".to_string(),
                    status: StepStatus::Success,
                    exit_code: Some(0),
                    duration_ms: 1200,
                    command: "subfinder -d example.com".to_string(),
                    input: None,
                    artifact: Some(dir.join("subfinder.txt")),
                    output_lines: 2,
                    records: Some(2),
                },
                RunResult {
                    tool: "amass".to_string(),
                    status: StepStatus::BinaryNotFound {
                        binary: "amass".to_string(),
                    },
                    exit_code: None,
                    duration_ms: 0,
                    command: "amass enum -d example.com".to_string(),
                    input: None,
                    artifact: None,
                    output_lines: 0,
                    records: None,
                },
            ],
            elapsed_ms: 1300,
            state: PipelineState::Completed,
        }
    }

    #[test]
    fn test_text_summary_lists_each_step() {
        let dir = tempfile::tempdir().unwrap();
        let text = render_text_summary(&sample(dir.path())).unwrap();
        assert!(text.contains("Target:     example.com"));
        assert!(text.contains("Steps (1/2 succeeded)"));
        assert!(text.contains("1. subfinder: success (exit 0)"));
        assert!(text.contains("2. amass: skipped"));
        assert!(text.contains("subfinder.txt (2 records)"));
        assert!(text.contains("Findings:   2"));
    }

    #[test]
    fn test_write_all_produces_parseable_json() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_all(&sample(dir.path())).unwrap();
        assert_eq!(paths.len(), 2);

        let json = std::fs::read_to_string(dir.path().join(SUMMARY_JSON)).unwrap();
        let parsed: PipelineResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.steps.len(), 2);
        assert_eq!(parsed.steps[0].records, Some(2));
        let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(raw["findings"], 2);
        assert_eq!(parsed.state, PipelineState::Completed);
    }
}
