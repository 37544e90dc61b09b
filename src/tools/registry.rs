use crate::config::{GlobalConfig, ToolOverride, WordlistConfig};
use crate::core::errors::{BugxError, BugxResult};
use crate::core::models::{ArtifactKind, FailurePolicy, FocusMode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const BUILTIN_TOOLS: &str = include_str!("builtin.yaml");

pub const FLAGS_TOKEN: &str = "{flags}";
/// Template token separating the stages of a multi-program pipeline.
pub const PIPE_TOKEN: &str = "|";

/// One external tool: how to invoke it and what it reads and writes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub binary: String,
    #[serde(default)]
    pub description: String,
    /// Argument template; the first token is the binary.
    pub template: Vec<String>,
    #[serde(default)]
    pub reads_stdin: bool,
    #[serde(default)]
    pub writes_stdout: bool,
    #[serde(default)]
    pub default_flags: Vec<String>,
    #[serde(default)]
    pub fullpower_flags: Vec<String>,
    #[serde(default = "default_speed_factor")]
    pub speed_factor: u32,
    /// Literal target kinds accepted when no list input is involved.
    #[serde(default)]
    pub focus: Vec<FocusMode>,
    #[serde(default)]
    pub consumes: Vec<ArtifactKind>,
    pub produces: ArtifactKind,
    #[serde(default)]
    pub wordlists: Vec<String>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    pub input_limit: Option<usize>,
    #[serde(default)]
    pub clean_input: bool,
}

fn default_speed_factor() -> u32 {
    1
}

impl ToolDescriptor {
    pub fn is_consumer(&self) -> bool {
        !self.consumes.is_empty()
    }

    pub fn accepts(&self, kind: ArtifactKind) -> bool {
        self.consumes.contains(&kind)
    }

    /// Whether the input seed for this tool is a URL rather than a host.
    pub fn wants_urls_only(&self) -> bool {
        self.accepts(ArtifactKind::UrlList) && !self.accepts(ArtifactKind::HostList)
    }

    pub fn uses(&self, placeholder: &str) -> bool {
        self.template.iter().any(|token| token.contains(placeholder))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> BugxResult<()> {
        let fail = |reason: &str| -> BugxResult<()> {
            Err(BugxError::InvalidConfig(format!(
                "tool '{}': {}",
                self.id, reason
            )))
        };

        if self.id.trim().is_empty() {
            return Err(BugxError::InvalidConfig("tool with empty id".to_string()));
        }
        if self.binary.trim().is_empty() {
            return fail("binary name is empty");
        }
        match self.template.first() {
            None => return fail("template is empty"),
            Some(first) if first != &self.binary => {
                return fail("template must start with the binary");
            }
            Some(_) => {}
        }
        if self
            .template
            .split(|t| t == PIPE_TOKEN)
            .any(|stage| stage.first().is_none_or(|p| p.is_empty() || p == FLAGS_TOKEN))
        {
            return fail("every pipeline stage needs a program");
        }
        if self.template.iter().filter(|t| *t == FLAGS_TOKEN).count() > 1 {
            return fail("{flags} may appear at most once");
        }
        if self.uses("{output}") == self.writes_stdout {
            return fail("exactly one of {output} or writes_stdout is required");
        }
        if self.writes_stdout && self.produces == ArtifactKind::Directory {
            return fail("a directory artifact cannot be captured from stdout");
        }
        if self.is_consumer() {
            if !(self.reads_stdin || self.uses("{input}")) {
                return fail("consumers must read {input} or stdin");
            }
        } else {
            if self.reads_stdin || self.uses("{input}") {
                return fail("only consumers can read an input list");
            }
            if self.focus.is_empty() {
                return fail("tools without list input need at least one focus mode");
            }
        }
        if self.speed_factor == 0 {
            return fail("speed_factor must be at least 1");
        }
        if self.timeout_secs == Some(0) {
            return fail("timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

/// Closed set of tool descriptors, validated once at startup.
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builtin() -> BugxResult<Self> {
        let tools: Vec<ToolDescriptor> = serde_yaml::from_str(BUILTIN_TOOLS)
            .map_err(|e| BugxError::InvalidConfig(format!("built-in tool table: {}", e)))?;
        Self::from_descriptors(tools)
    }

    /// Built-in registry with `[tools.<id>]` overrides applied and wordlist
    /// names checked against `[wordlists]`.
    pub fn with_config(config: &GlobalConfig) -> BugxResult<Self> {
        let mut registry = Self::builtin()?;
        registry.apply_overrides(&config.tools)?;
        registry.validate_wordlists(&config.wordlists)?;
        Ok(registry)
    }

    pub fn from_descriptors(tools: Vec<ToolDescriptor>) -> BugxResult<Self> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            tool.validate()?;
            if index.insert(tool.id.clone(), i).is_some() {
                return Err(BugxError::InvalidConfig(format!(
                    "duplicate tool id '{}'",
                    tool.id
                )));
            }
        }
        tracing::debug!("Tool registry holds {} descriptors", tools.len());
        Ok(Self { tools, index })
    }

    pub fn apply_overrides(&mut self, overrides: &HashMap<String, ToolOverride>) -> BugxResult<()> {
        for (id, tool_override) in overrides {
            let idx = *self
                .index
                .get(id)
                .ok_or_else(|| BugxError::UnknownTool(id.clone()))?;
            let tool = &mut self.tools[idx];
            if let Some(flags) = &tool_override.flags {
                tool.default_flags = flags.clone();
            }
            if let Some(secs) = tool_override.timeout_secs {
                tool.timeout_secs = Some(secs);
            }
            tracing::debug!("Applied config override to {}", id);
        }
        Ok(())
    }

    /// Every wordlist name a descriptor references must be configured.
    pub fn validate_wordlists(&self, wordlists: &WordlistConfig) -> BugxResult<()> {
        for tool in &self.tools {
            if tool.uses("{wordlist}") && tool.wordlists.is_empty() {
                return Err(BugxError::InvalidConfig(format!(
                    "tool '{}' uses {{wordlist}} but names no wordlist",
                    tool.id
                )));
            }
            for name in &tool.wordlists {
                if !wordlists.contains(name) {
                    return Err(BugxError::UnknownWordlist(format!(
                        "'{}' referenced by {}",
                        name, tool.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Checks that the wordlist files for the steps about to run exist.
    pub fn check_wordlists(
        &self,
        steps: &[&ToolDescriptor],
        wordlists: &WordlistConfig,
        wordlist_override: Option<&str>,
    ) -> BugxResult<()> {
        let mut checked = HashSet::new();
        for tool in steps.iter().filter(|t| t.uses("{wordlist}")) {
            let name = match wordlist_override {
                Some(name) => name,
                None => tool.wordlists.first().map(String::as_str).unwrap_or_default(),
            };
            if checked.insert(name) {
                wordlists.resolve_existing(name)?;
            }
        }
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> BugxResult<&ToolDescriptor> {
        self.index
            .get(id)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| BugxError::UnknownTool(id.to_string()))
    }

    /// Resolves every id, failing on the first unknown one.
    pub fn lookup_all<S: AsRef<str>>(&self, ids: &[S]) -> BugxResult<Vec<&ToolDescriptor>> {
        ids.iter().map(|id| self.lookup(id.as_ref())).collect()
    }

    pub fn all(&self) -> &[ToolDescriptor] {
        &self.tools
    }
}
