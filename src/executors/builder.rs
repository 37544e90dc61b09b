use crate::config::{FlagMode, WordlistConfig};
use crate::core::command::Command;
use crate::core::errors::{BugxError, BugxResult};
use crate::core::models::ArtifactKind;
use crate::core::target::Target;
use crate::tools::registry::{ToolDescriptor, FLAGS_TOKEN, PIPE_TOKEN};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const DEFAULT_SPEED: u32 = 50;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(host|url|target|input|output|outdir|speed|wordlist)\}")
        .expect("placeholder pattern is valid")
});

/// Integer speed/thread value; anything unparsable falls back to the default.
pub fn parse_speed(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(DEFAULT_SPEED)
}

/// A command ready for the runner plus where its artifact will land.
#[derive(Debug, Clone)]
pub struct BuiltCommand {
    pub tool: String,
    pub command: Command,
    pub artifact: PathBuf,
    pub produces: ArtifactKind,
    pub input: Option<PathBuf>,
    /// File the runner connects to the child's stdin.
    pub stdin: Option<PathBuf>,
    /// The runner writes the child's stdout to `artifact`.
    pub capture_stdout: bool,
}

impl fmt::Display for BuiltCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command.script())?;
        if let Some(stdin) = &self.stdin {
            write!(f, " < {}", shell_words::quote(&path_arg(stdin)))?;
        }
        if self.capture_stdout {
            write!(f, " > {}", shell_words::quote(&path_arg(&self.artifact)))?;
        }
        Ok(())
    }
}

/// Turns descriptors into concrete commands for one run.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    pub output_root: PathBuf,
    pub speed: u32,
    pub flag_mode: FlagMode,
    /// Replaces every descriptor's default flags when set.
    pub explicit_flags: Option<Vec<String>>,
    pub wordlists: WordlistConfig,
    pub wordlist_override: Option<String>,
}

impl CommandBuilder {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            speed: DEFAULT_SPEED,
            flag_mode: FlagMode::Default,
            explicit_flags: None,
            wordlists: WordlistConfig::default(),
            wordlist_override: None,
        }
    }

    pub fn target_dir(&self, target: &Target) -> PathBuf {
        self.output_root.join(&target.slug)
    }

    /// `<root>/<slug>/<tool>.<ext>`, or `<root>/<slug>/<tool>/` for directories.
    pub fn artifact_path(&self, tool: &ToolDescriptor, target: &Target) -> PathBuf {
        let dir = self.target_dir(target);
        match tool.produces.extension() {
            Some(ext) => dir.join(format!("{}.{}", tool.id, ext)),
            None => dir.join(&tool.id),
        }
    }

    pub fn flags_for(&self, tool: &ToolDescriptor) -> Vec<String> {
        if let Some(explicit) = &self.explicit_flags {
            return explicit.clone();
        }
        let mut flags = tool.default_flags.clone();
        if self.flag_mode == FlagMode::Fullpower {
            flags.extend(tool.fullpower_flags.iter().cloned());
        }
        flags
    }

    pub fn speed_for(&self, tool: &ToolDescriptor) -> u32 {
        match self.flag_mode {
            FlagMode::Fullpower => self.speed.saturating_mul(tool.speed_factor),
            FlagMode::Default => self.speed,
        }
    }

    /// Builds the command and creates `<root>/<slug>/` for it.
    pub fn build(
        &self,
        tool: &ToolDescriptor,
        target: &Target,
        input: Option<&Path>,
    ) -> BugxResult<BuiltCommand> {
        let built = self.render(tool, target, input)?;
        std::fs::create_dir_all(self.target_dir(target))?;
        Ok(built)
    }

    /// Same as [`CommandBuilder::build`] without touching the filesystem.
    pub fn render(
        &self,
        tool: &ToolDescriptor,
        target: &Target,
        input: Option<&Path>,
    ) -> BugxResult<BuiltCommand> {
        if !tool.is_consumer() && !tool.focus.contains(&target.kind) {
            return Err(BugxError::invalid_target(
                &target.raw,
                format!("{} does not take {} targets", tool.id, target.kind),
            ));
        }
        if tool.reads_stdin && input.is_none() {
            return Err(BugxError::MissingInput {
                tool: tool.id.clone(),
            });
        }

        let artifact = self.artifact_path(tool, target);
        let values = Values {
            builder: self,
            tool,
            target,
            input,
            artifact: &artifact,
        };

        let mut stages: Vec<Vec<String>> = Vec::new();
        let mut argv = Vec::with_capacity(tool.template.len());
        for token in &tool.template {
            if token == PIPE_TOKEN {
                stages.push(std::mem::take(&mut argv));
            } else if token == FLAGS_TOKEN {
                argv.extend(self.flags_for(tool));
            } else {
                argv.push(values.substitute(token)?);
            }
        }

        let command = if stages.is_empty() {
            let (program, args) = argv
                .split_first()
                .ok_or_else(|| BugxError::InvalidConfig(format!("tool '{}' has no program", tool.id)))?;
            Command::ArgVector {
                program: program.clone(),
                args: args.to_vec(),
            }
        } else {
            stages.push(argv);
            Command::ShellPipeline { stages }
        };

        Ok(BuiltCommand {
            tool: tool.id.clone(),
            command,
            artifact,
            produces: tool.produces,
            input: input.map(Path::to_path_buf),
            stdin: input.filter(|_| tool.reads_stdin).map(Path::to_path_buf),
            capture_stdout: tool.writes_stdout,
        })
    }
}

struct Values<'a> {
    builder: &'a CommandBuilder,
    tool: &'a ToolDescriptor,
    target: &'a Target,
    input: Option<&'a Path>,
    artifact: &'a Path,
}

impl Values<'_> {
    fn substitute(&self, token: &str) -> BugxResult<String> {
        let mut out = String::with_capacity(token.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(token) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&token[last..whole.start()]);
            out.push_str(&self.value(name.as_str())?);
            last = whole.end();
        }
        out.push_str(&token[last..]);
        Ok(out)
    }

    fn value(&self, name: &str) -> BugxResult<String> {
        let target = self.target;
        let tool = &self.tool.id;
        match name {
            "host" => target.host.clone().ok_or_else(|| {
                BugxError::invalid_target(&target.raw, format!("{} needs a host", tool))
            }),
            "url" => target.url().ok_or_else(|| {
                BugxError::invalid_target(&target.raw, format!("{} needs a single URL", tool))
            }),
            "target" => Ok(target.canonical.clone()),
            "input" => self
                .input
                .map(path_arg)
                .ok_or_else(|| BugxError::MissingInput { tool: tool.clone() }),
            "output" => Ok(path_arg(self.artifact)),
            "outdir" => Ok(path_arg(&self.builder.target_dir(target))),
            "speed" => Ok(self.builder.speed_for(self.tool).to_string()),
            "wordlist" => {
                let name = match &self.builder.wordlist_override {
                    Some(name) => name.as_str(),
                    None => self.tool.wordlists.first().map(String::as_str).ok_or_else(|| {
                        BugxError::UnknownWordlist(format!("{} names no wordlist", tool))
                    })?,
                };
                Ok(path_arg(&self.builder.wordlists.resolve(name)?))
            }
            other => Err(BugxError::InvalidConfig(format!(
                "unknown placeholder {{{}}} in {}",
                other, tool
            ))),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
