use super::types::GlobalConfig;
use crate::utils::fs::expand_home;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATHS: &[&str] = &["./bugx.toml", "./config/bugx.toml"];
const SYSTEM_CONFIG_PATH: &str = "/etc/bugx/bugx.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the first config found, or the built-in defaults.
    ///
    /// An explicit path must exist; the search locations are optional.
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<GlobalConfig> {
        if let Some(path) = custom_path {
            let path = expand_home(&path.to_string_lossy());
            if !path.exists() {
                anyhow::bail!("Config file does not exist: {:?}", path);
            }
            return Self::load_from_file(&path)
                .with_context(|| format!("Failed to load config from {:?}", path));
        }

        for path in Self::search_paths() {
            if path.exists() {
                let config = Self::load_from_file(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))?;
                tracing::info!("Loaded configuration from: {:?}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using default settings");
        let config = GlobalConfig::default();
        Self::validate_config(&config)?;
        Ok(config)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect();
        if let Some(dirs) = ProjectDirs::from("", "", "bugx") {
            paths.push(dirs.config_dir().join("bugx.toml"));
        }
        paths.push(PathBuf::from(SYSTEM_CONFIG_PATH));
        paths
    }

    pub fn load_from_file(path: &Path) -> Result<GlobalConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<GlobalConfig> {
        let mut config: GlobalConfig =
            toml::from_str(content).context("Failed to parse TOML config")?;
        config.wordlists = config.wordlists.with_defaults();
        Self::validate_config(&config)?;
        Ok(config)
    }

    fn validate_config(config: &GlobalConfig) -> Result<()> {
        if config.run.workers == 0 {
            anyhow::bail!("run.workers must be greater than 0");
        }
        if config.run.timeout_secs == 0 {
            anyhow::bail!("run.timeout_secs must be greater than 0");
        }
        if config.exec.shell.trim().is_empty() {
            anyhow::bail!("exec.shell cannot be empty");
        }
        for (name, tools) in &config.workflows {
            if tools.is_empty() {
                anyhow::bail!("workflow '{}' has no tools", name);
            }
        }
        for (id, tool) in &config.tools {
            if tool.timeout_secs == Some(0) {
                anyhow::bail!("tools.{}.timeout_secs must be greater than 0", id);
            }
        }
        Ok(())
    }

    /// Writes the effective defaults as a starting point for users.
    pub fn generate_template(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&GlobalConfig::default())
            .context("Failed to serialize configuration to TOML")?;
        crate::utils::fs::atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write config template: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::FlagMode;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::parse("").unwrap();
        assert_eq!(config.run.output_root, PathBuf::from("results"));
        assert_eq!(config.run.timeout_secs, 600);
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.run.flag_mode, FlagMode::Default);
        assert_eq!(config.exec.shell, "sh");
        assert!(config.wordlists.contains("common"));
    }

    #[test]
    fn test_load_custom_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
[run]
output_root = "/tmp/bugx-out"
workers = 8
flag_mode = "fullpower"

[exec]
shell = "bash"
extra_paths = ["/opt/tools/bin"]
env = { GOPATH = "/opt/go" }

[wordlists]
common = "/opt/lists/common.txt"

[tools.nuclei]
flags = ["-severity", "critical"]
timeout_secs = 120

[workflows]
quick = ["subfinder", "httpx"]
"#;
        fs::write(&temp_file, config_content).unwrap();

        let config = ConfigLoader::load_with_custom_path(Some(temp_file.path())).unwrap();
        assert_eq!(config.run.output_root, PathBuf::from("/tmp/bugx-out"));
        assert_eq!(config.run.workers, 8);
        assert_eq!(config.run.flag_mode, FlagMode::Fullpower);
        assert_eq!(config.exec.shell, "bash");
        assert_eq!(config.exec.env["GOPATH"], "/opt/go");
        assert_eq!(config.wordlists.wordlists["common"], "/opt/lists/common.txt");
        assert!(config.wordlists.contains("big"));
        let nuclei = &config.tools["nuclei"];
        assert_eq!(
            nuclei.flags,
            Some(vec!["-severity".to_string(), "critical".to_string()])
        );
        assert_eq!(nuclei.timeout_secs, Some(120));
        assert_eq!(config.workflows["quick"], vec!["subfinder", "httpx"]);
    }

    #[test]
    fn test_validation_errors() {
        let err = ConfigLoader::parse("[run]\nworkers = 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("workers must be greater than 0"));

        let err = ConfigLoader::parse("[workflows]\nempty = []\n").unwrap_err();
        assert!(format!("{:#}", err).contains("workflow 'empty' has no tools"));
    }

    #[test]
    fn test_missing_custom_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(ConfigLoader::load_with_custom_path(Some(&missing)).is_err());
    }

    #[test]
    fn test_generated_template_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bugx.toml");
        ConfigLoader::generate_template(&path).unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.exec.extra_paths.len(), 4);
    }
}
