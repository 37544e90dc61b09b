use crate::config::ExecConfig;
use crate::utils::fs::expand_home;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything a step process inherits: working directory, environment
/// variables and the shell used for pipelines.
///
/// Built once per run and passed to the runner; nothing here touches the
/// bugx process's own environment.
#[derive(Debug, Clone)]
pub struct ExecEnv {
    pub workdir: PathBuf,
    pub vars: BTreeMap<String, String>,
    pub shell: String,
}

impl ExecEnv {
    /// Snapshot of the current environment with `[exec]` applied on top.
    pub fn from_config(config: &ExecConfig, workdir: impl Into<PathBuf>) -> Self {
        let vars: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        let mut env = Self {
            workdir: workdir.into(),
            vars,
            shell: config.shell.clone(),
        };
        let extra: Vec<PathBuf> = config.extra_paths.iter().map(|p| expand_home(p)).collect();
        env.prepend_path(&extra);
        config
            .env
            .iter()
            .fold(env, |env, (key, value)| env.with_var(key, value))
    }

    /// Environment holding only `PATH` (and `HOME` when known).
    pub fn isolated(workdir: impl Into<PathBuf>, path: &str) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("PATH".to_string(), path.to_string());
        if let Ok(home) = std::env::var("HOME") {
            vars.insert("HOME".to_string(), home);
        }
        Self {
            workdir: workdir.into(),
            vars,
            shell: "sh".to_string(),
        }
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn search_path(&self) -> Option<&str> {
        self.vars.get("PATH").map(String::as_str)
    }

    pub fn prepend_path(&mut self, dirs: &[PathBuf]) {
        if dirs.is_empty() {
            return;
        }
        let mut entries: Vec<PathBuf> = dirs.to_vec();
        if let Some(existing) = self.search_path() {
            entries.extend(std::env::split_paths(existing));
        }
        match std::env::join_paths(entries) {
            Ok(joined) => {
                self.vars
                    .insert("PATH".to_string(), joined.to_string_lossy().into_owned());
            }
            Err(e) => tracing::warn!("Ignoring extra PATH entries: {}", e),
        }
    }

    /// Absolute path of `program` on this environment's `PATH`.
    pub fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which_in(program, self.search_path(), &self.workdir).ok()
    }
}
