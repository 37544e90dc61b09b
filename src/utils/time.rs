use std::sync::atomic::{AtomicU32, Ordering};

static RUN_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Unique id for one pipeline run: local timestamp, process id and a
/// per-process counter, so parallel runs never share one.
pub fn new_run_id(slug: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run_{}_{}_{}-{}", slug, timestamp, std::process::id(), seq)
}

/// `1h02m03s`, `4m05s` or `6.1s`.
pub fn format_duration(ms: u128) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = new_run_id("example");
        let b = new_run_id("example");
        assert_ne!(a, b);
        assert!(a.starts_with("run_example_"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(6100), "6.1s");
        assert_eq!(format_duration(245_000), "4m05s");
        assert_eq!(format_duration(3_723_000), "1h02m03s");
    }
}
