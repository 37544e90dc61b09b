use crate::core::errors::{BugxError, BugxResult};
use crate::utils::fs::expand_home;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Named wordlists from the `[wordlists]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WordlistConfig {
    pub wordlists: BTreeMap<String, String>,
}

impl Default for WordlistConfig {
    fn default() -> Self {
        let mut wordlists = BTreeMap::new();
        wordlists.insert(
            "common".to_string(),
            "/usr/share/wordlists/dirb/common.txt".to_string(),
        );
        wordlists.insert(
            "big".to_string(),
            "/usr/share/wordlists/dirb/big.txt".to_string(),
        );
        wordlists.insert("lfi".to_string(), "~/BUGx/wordlists/lfi.txt".to_string());
        Self { wordlists }
    }
}

impl WordlistConfig {
    /// Adds the built-in names the user did not redefine.
    pub fn with_defaults(mut self) -> Self {
        for (name, path) in WordlistConfig::default().wordlists {
            self.wordlists.entry(name).or_insert(path);
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.wordlists.contains_key(name)
    }

    /// Resolve a wordlist name or path to a file path.
    ///
    /// An existing file wins over a configured name of the same spelling.
    /// Configured names are returned without an existence check; see
    /// [`WordlistConfig::resolve_existing`].
    pub fn resolve(&self, name_or_path: &str) -> BugxResult<PathBuf> {
        let direct = expand_home(name_or_path);
        if direct.is_file() {
            return Ok(direct);
        }

        self.wordlists
            .get(name_or_path)
            .map(|p| expand_home(p))
            .ok_or_else(|| {
                BugxError::UnknownWordlist(format!(
                    "'{}' (available: {})",
                    name_or_path,
                    self.list_available().join(", ")
                ))
            })
    }

    /// Like [`WordlistConfig::resolve`], but the file must also exist.
    pub fn resolve_existing(&self, name_or_path: &str) -> BugxResult<PathBuf> {
        let path = self.resolve(name_or_path)?;
        if !Path::new(&path).is_file() {
            return Err(BugxError::UnknownWordlist(format!(
                "'{}' points to missing file {}",
                name_or_path,
                path.display()
            )));
        }
        Ok(path)
    }

    pub fn list_available(&self) -> Vec<String> {
        self.wordlists.keys().cloned().collect()
    }
}
