use super::wordlist::WordlistConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub run: RunConfig,
    pub exec: ExecConfig,
    pub wordlists: WordlistConfig,
    pub tools: HashMap<String, ToolOverride>,
    pub workflows: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagMode {
    #[default]
    Default,
    Fullpower,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub output_root: PathBuf,
    pub timeout_secs: u64,
    /// Kept as text so a bad value degrades to the default instead of
    /// failing the whole config.
    pub speed: toml::Value,
    pub flag_mode: FlagMode,
    pub workers: usize,
    pub keep_scratch: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("results"),
            timeout_secs: 600,
            speed: toml::Value::Integer(50),
            flag_mode: FlagMode::Default,
            workers: 4,
            keep_scratch: false,
        }
    }
}

impl RunConfig {
    /// `speed` as the text the speed parser expects.
    pub fn speed_text(&self) -> String {
        match &self.speed {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecConfig {
    pub shell: String,
    /// Prepended to `PATH` for every step.
    pub extra_paths: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            extra_paths: vec![
                "~/go/bin".to_string(),
                "~/.local/bin".to_string(),
                "~/venv/bin".to_string(),
                "~/BUGx/bin".to_string(),
            ],
            env: BTreeMap::new(),
        }
    }
}

/// Per-tool settings from `[tools.<id>]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolOverride {
    pub flags: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_text_accepts_numbers_and_strings() {
        let mut run = RunConfig::default();
        assert_eq!(run.speed_text(), "50");
        run.speed = toml::Value::String("120".to_string());
        assert_eq!(run.speed_text(), "120");
        run.speed = toml::Value::Boolean(true);
        assert_eq!(run.speed_text(), "true");
    }
}
