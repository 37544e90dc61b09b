use super::progress::TargetProgress;
use super::table::TableBuilder;
use crate::core::events::{PipelineEvent, Stream};
use crate::core::models::{PipelineResult, StepStatus};
use crate::core::state::PipelineState;
use crate::utils::time::format_duration;
use colored::*;
use tokio::sync::mpsc::UnboundedReceiver;

/// Turns pipeline events into console lines.
pub struct EventPrinter {
    progress: TargetProgress,
    show_stderr: bool,
    tag_target: bool,
}

impl EventPrinter {
    pub fn new(progress: TargetProgress, show_stderr: bool, tag_target: bool) -> Self {
        Self {
            progress,
            show_stderr,
            tag_target,
        }
    }

    pub async fn run(self, mut rx: UnboundedReceiver<PipelineEvent>) {
        while let Some(event) = rx.recv().await {
            if let Some(line) = self.format(&event) {
                self.progress.println(line);
            }
            if let PipelineEvent::PipelineFinished { target, .. } = &event {
                self.progress.target_done(target);
            }
        }
        self.progress.finish();
    }

    fn format(&self, event: &PipelineEvent) -> Option<String> {
        let tag = if self.tag_target {
            format!("{} ", format!("[{}]", event.target()).dimmed())
        } else {
            String::new()
        };

        let body = match event {
            PipelineEvent::StepStarted {
                index,
                total,
                tool,
                command,
                ..
            } => format!(
                "{} {} {}\n    {}",
                format!("[{}/{}]", index + 1, total).blue().bold(),
                "▶".cyan(),
                tool.bold(),
                command.dimmed()
            ),
            PipelineEvent::Output {
                tool, stream, line, ..
            } => match stream {
                Stream::Stdout => format!("    {} {}", format!("{}:", tool).dimmed(), line),
                Stream::Stderr if self.show_stderr => {
                    format!("    {} {}", format!("{}!", tool).yellow().dimmed(), line.dimmed())
                }
                Stream::Stderr => return None,
            },
            PipelineEvent::StepFinished { result, .. } => {
                let mut detail = format!(
                    "{} in {}",
                    result.status.label(),
                    format_duration(result.duration_ms)
                );
                if let Some(records) = result.records {
                    detail.push_str(&format!(", {} records", records));
                }
                let mut line = format!(
                    "    {} {} {}",
                    status_mark(&result.status),
                    result.tool,
                    detail.dimmed()
                );
                if let Some(err) = result.error() {
                    line.push_str(&format!(" ({})", err.to_string().yellow()));
                }
                line
            }
            PipelineEvent::PipelineFinished { state, .. } => match state {
                PipelineState::Aborted { reason } => {
                    format!("{} {}", "✗ pipeline aborted:".red().bold(), reason)
                }
                _ => format!("{}", "✓ pipeline completed".green().bold()),
            },
        };
        Some(format!("{}{}", tag, body))
    }
}

fn status_mark(status: &StepStatus) -> ColoredString {
    match status {
        StepStatus::Success => "✓".green(),
        StepStatus::BinaryNotFound { .. } => "○".yellow(),
        StepStatus::Cancelled => "■".red(),
        _ => "✗".red(),
    }
}

pub fn print_summary(results: &[PipelineResult]) {
    println!("\n{}", "═══════════════════════════════════════".green().bold());
    println!("{}", "bugx Run Complete".green().bold());
    println!("{}", "═══════════════════════════════════════".green().bold());

    for result in results {
        println!("\n{}: {}", "Target".cyan().bold(), result.target);
        println!("{}: {}", "Run ID".cyan().bold(), result.run_id);
        match &result.state {
            PipelineState::Aborted { reason } => {
                println!("{}: {} ({})", "State".cyan().bold(), "aborted".red().bold(), reason)
            }
            _ => println!("{}: {}", "State".cyan().bold(), "completed".green()),
        }
        println!(
            "{}: {}/{} in {}",
            "Steps".cyan().bold(),
            result.succeeded().to_string().green().bold(),
            result.steps.len(),
            format_duration(result.elapsed_ms)
        );
        println!(
            "{}: {}",
            "Findings".cyan().bold(),
            result.total_records().to_string().yellow().bold()
        );
        if !result.steps.is_empty() {
            println!("{}", TableBuilder::step_summary(result));
        }
        println!(
            "{}",
            format!("Results written to {}", result.output_dir.display()).green().dimmed()
        );
    }
}

/// Closing box for a run over several workflows.
pub fn print_workflow_totals(batches: &[(String, Vec<PipelineResult>)]) {
    let total: usize = batches
        .iter()
        .flat_map(|(_, results)| results)
        .map(PipelineResult::total_records)
        .sum();

    println!("\n{}", "═══════════════════════════════════════".magenta().bold());
    println!("{}", "All Workflows Summary".magenta().bold());
    println!("{}", "═══════════════════════════════════════".magenta().bold());
    println!("{}", TableBuilder::workflow_totals(batches));
    println!(
        "{}: {}   {}: {}",
        "Total Findings".cyan().bold(),
        total.to_string().yellow().bold(),
        "Workflows Executed".cyan().bold(),
        batches.len()
    );
}
