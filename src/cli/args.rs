use crate::config::FlagMode;
use crate::core::models::FocusMode;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "bugx", version, about = "Chain bug-bounty recon tools into workflows")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose human output, including tool stderr
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Debug logs (implies verbose)
    #[arg(short = 'd', long = "debug", global = true, action = ArgAction::SetTrue)]
    pub debug: bool,

    /// Config file instead of the default search locations
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a workflow or a tool list against one or more targets
    Run(RunArgs),

    /// Show which tool binaries are installed
    Tools,

    /// List the available workflows
    Workflows,

    /// Write a config file with the default settings
    Init {
        #[arg(default_value = "bugx.toml", value_name = "PATH")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long = "force", action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Named workflow (see `bugx workflows`); `all` runs every scan workflow
    #[arg(short = 'w', long = "workflow", conflicts_with = "tools", required_unless_present = "tools")]
    pub workflow: Option<String>,

    /// Comma-separated tool ids, run in order
    #[arg(long = "tools", value_name = "a,b,c")]
    pub tools: Option<String>,

    /// Single target: domain, URL, IP/CIDR or list file
    #[arg(
        short = 't',
        long = "target",
        conflicts_with = "targets_file",
        required_unless_present = "targets_file"
    )]
    pub target: Option<String>,

    /// File with one target per line
    #[arg(short = 'l', long = "targets-file", value_name = "FILE")]
    pub targets_file: Option<PathBuf>,

    /// How to read the target(s)
    #[arg(short = 'm', long = "mode", value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Thread/rate value handed to the tools; non-numbers fall back to 50
    #[arg(short = 's', long = "speed")]
    pub speed: Option<String>,

    /// Flag set to use
    #[arg(long = "flags-mode", value_enum)]
    pub flags_mode: Option<FlagModeArg>,

    /// Flags replacing every tool's defaults, as shell words
    #[arg(long = "flags", allow_hyphen_values = true)]
    pub flags: Option<String>,

    /// Wordlist name from the config, or a path
    #[arg(long = "wordlist")]
    pub wordlist: Option<String>,

    /// Output root directory
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Per-step timeout in seconds, for every tool
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Targets processed in parallel
    #[arg(long = "workers")]
    pub workers: Option<usize>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long = "yes", action = ArgAction::SetTrue)]
    pub yes: bool,

    /// Keep intermediate files under <output>/<slug>/.scratch-*
    #[arg(long = "keep-scratch", action = ArgAction::SetTrue)]
    pub keep_scratch: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Auto,
    Domain,
    Url,
    File,
    Network,
}

impl ModeArg {
    /// `None` means classify each target on its own.
    pub fn focus(self) -> Option<FocusMode> {
        match self {
            ModeArg::Auto => None,
            ModeArg::Domain => Some(FocusMode::Domain),
            ModeArg::Url => Some(FocusMode::Url),
            ModeArg::File => Some(FocusMode::File),
            ModeArg::Network => Some(FocusMode::Network),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagModeArg {
    Default,
    Fullpower,
}

impl From<FlagModeArg> for FlagMode {
    fn from(arg: FlagModeArg) -> Self {
        match arg {
            FlagModeArg::Default => FlagMode::Default,
            FlagModeArg::Fullpower => FlagMode::Fullpower,
        }
    }
}
