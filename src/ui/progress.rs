use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Bar over targets, shown only when more than one runs.
pub struct TargetProgress {
    bar: Option<ProgressBar>,
}

impl TargetProgress {
    pub fn new(total: usize) -> Self {
        if total < 2 {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} targets {msg}",
        )
        .map(|s| s.progress_chars("█▉▊▋▌▍▎▏ "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar: Some(bar) }
    }

    /// Prints above the bar so lines don't tear it.
    pub fn println(&self, line: impl AsRef<str>) {
        match &self.bar {
            Some(bar) => bar.println(line.as_ref()),
            None => println!("{}", line.as_ref()),
        }
    }

    pub fn target_done(&self, target: &str) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
            bar.set_message(format!("last: {}", target));
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message("done".green().to_string());
        }
    }
}
