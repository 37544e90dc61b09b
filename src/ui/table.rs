use crate::core::models::{PipelineResult, StepStatus};
use crate::pipeline::{PlannedStep, WorkflowCatalog};
use crate::tools::checker::ToolAvailabilityReport;
use crate::utils::time::format_duration;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn new() -> Self {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_content_arrangement(ContentArrangement::Dynamic);

        Self { table }
    }

    fn header(&mut self, titles: &[&str]) {
        self.table.set_header(
            titles
                .iter()
                .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    }

    pub fn step_summary(result: &PipelineResult) -> String {
        let mut builder = Self::new();
        builder.header(&["#", "Tool", "Status", "Exit", "Duration", "Records", "Output"]);

        for (i, step) in result.steps.iter().enumerate() {
            let color = match step.status {
                StepStatus::Success => Color::Green,
                StepStatus::BinaryNotFound { .. } => Color::Yellow,
                _ => Color::Red,
            };
            builder.table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&step.tool),
                Cell::new(step.status.label()).fg(color),
                Cell::new(step.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())),
                Cell::new(format_duration(step.duration_ms)),
                Cell::new(step.records.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())),
                Cell::new(
                    step.artifact
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]);
        }

        builder.table.to_string()
    }

    /// One row per workflow of a multi-workflow run, with its findings.
    pub fn workflow_totals(batches: &[(String, Vec<PipelineResult>)]) -> String {
        let mut builder = Self::new();
        builder.header(&["Workflow", "Targets", "Steps OK", "Findings", "State"]);

        for (name, results) in batches {
            let steps: usize = results.iter().map(|r| r.steps.len()).sum();
            let succeeded: usize = results.iter().map(PipelineResult::succeeded).sum();
            let findings: usize = results.iter().map(PipelineResult::total_records).sum();
            let state = if results.iter().any(PipelineResult::is_aborted) {
                Cell::new("aborted").fg(Color::Red)
            } else {
                Cell::new("completed").fg(Color::Green)
            };
            builder.table.add_row(vec![
                Cell::new(name).fg(Color::Cyan),
                Cell::new(results.len()),
                Cell::new(format!("{}/{}", succeeded, steps)),
                Cell::new(findings),
                state,
            ]);
        }

        builder.table.to_string()
    }

    pub fn plan(steps: &[PlannedStep]) -> String {
        let mut builder = Self::new();
        builder.header(&["#", "Tool", "Command", "Timeout"]);

        for step in steps {
            builder.table.add_row(vec![
                Cell::new(step.index + 1),
                Cell::new(&step.tool).fg(Color::Cyan),
                Cell::new(&step.command),
                Cell::new(format!("{}s", step.timeout_secs)),
            ]);
        }

        builder.table.to_string()
    }

    pub fn tool_availability(report: &ToolAvailabilityReport) -> String {
        let mut builder = Self::new();
        builder.header(&["Tool", "Binary", "Status", "Description"]);

        for status in &report.tools {
            let state = match &status.path {
                Some(path) => Cell::new(path.display()).fg(Color::Green),
                None => Cell::new("missing").fg(Color::Red),
            };
            builder.table.add_row(vec![
                Cell::new(&status.id),
                Cell::new(&status.binary),
                state,
                Cell::new(&status.description),
            ]);
        }

        builder.table.to_string()
    }

    pub fn workflows(catalog: &WorkflowCatalog) -> String {
        let mut builder = Self::new();
        builder.header(&["Workflow", "Steps", "Description"]);

        for workflow in catalog.iter() {
            builder.table.add_row(vec![
                Cell::new(&workflow.name).fg(Color::Cyan),
                Cell::new(workflow.steps.join(" → ")),
                Cell::new(&workflow.description),
            ]);
        }

        builder.table.to_string()
    }
}
