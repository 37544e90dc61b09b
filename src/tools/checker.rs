use crate::executors::env::ExecEnv;
use crate::tools::registry::ToolDescriptor;
use std::path::PathBuf;

pub struct ToolAvailabilityReport {
    pub tools: Vec<ToolStatus>,
    pub missing_count: usize,
    pub total_count: usize,
}

impl ToolAvailabilityReport {
    pub fn installed_count(&self) -> usize {
        self.total_count - self.missing_count
    }
}

#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub id: String,
    pub binary: String,
    pub description: String,
    /// Where the binary resolved in the step environment.
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn installed(&self) -> bool {
        self.path.is_some()
    }
}

/// Looks binaries up the same way steps will, so `bugx tools` agrees with
/// what a run would skip.
pub struct ToolChecker<'a> {
    env: &'a ExecEnv,
}

impl<'a> ToolChecker<'a> {
    pub fn new(env: &'a ExecEnv) -> Self {
        Self { env }
    }

    pub fn check_all_tools(&self, tools: &[ToolDescriptor]) -> ToolAvailabilityReport {
        let statuses: Vec<ToolStatus> = tools
            .iter()
            .map(|tool| ToolStatus {
                id: tool.id.clone(),
                binary: tool.binary.clone(),
                description: tool.description.clone(),
                path: self.env.resolve(&tool.binary),
            })
            .collect();
        let missing_count = statuses.iter().filter(|s| !s.installed()).count();

        ToolAvailabilityReport {
            missing_count,
            total_count: statuses.len(),
            tools: statuses,
        }
    }

    pub fn get_installation_summary(&self, report: &ToolAvailabilityReport) -> String {
        if report.missing_count == 0 {
            "All tools are installed and ready!".to_string()
        } else {
            format!(
                "{} of {} tools installed. Workflows will skip the {} missing.",
                report.installed_count(),
                report.total_count,
                report.missing_count
            )
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{fake_env, fake_subfinder};
    use crate::tools::registry::ToolRegistry;

    #[test]
    fn test_check_all_tools_uses_step_path() {
        let dir = tempfile::tempdir().unwrap();
        fake_subfinder(dir.path());
        let env = fake_env(dir.path(), dir.path());
        let registry = ToolRegistry::builtin().unwrap();

        let checker = ToolChecker::new(&env);
        let report = checker.check_all_tools(registry.all());

        assert_eq!(report.total_count, registry.all().len());
        let subfinder = report.tools.iter().find(|s| s.id == "subfinder").unwrap();
        assert_eq!(subfinder.path.as_deref(), Some(dir.path().join("subfinder").as_path()));
        let amass = report.tools.iter().find(|s| s.id == "amass").unwrap();
        assert!(!amass.installed());
        assert!(checker.get_installation_summary(&report).contains("missing"));
    }

    #[test]
    fn test_summary_when_nothing_missing() {
        let dir = tempfile::tempdir().unwrap();
        fake_subfinder(dir.path());
        let env = fake_env(dir.path(), dir.path());
        let registry = ToolRegistry::builtin().unwrap();
        let subfinder = registry.lookup("subfinder").unwrap().clone();

        let checker = ToolChecker::new(&env);
        let report = checker.check_all_tools(&[subfinder]);
        assert_eq!(report.installed_count(), 1);
        assert_eq!(checker.get_installation_summary(&report), "All tools are installed and ready!");
    }
}
