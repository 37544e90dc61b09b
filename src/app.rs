use crate::{
    cli::args::{Cli, Commands, RunArgs},
    config::{ConfigLoader, GlobalConfig},
    core::events::PipelineEvent,
    core::models::PipelineResult,
    core::target::{normalize, normalize_auto, read_targets_file, Target},
    executors::{builder::parse_speed, CommandBuilder, ExecEnv},
    pipeline::{workflows::parse_tool_list, PipelineOptions, Sequencer, WorkflowCatalog},
    reporters,
    tools::{ToolChecker, ToolRegistry},
    ui::{
        printer::{self, EventPrinter},
        progress::TargetProgress,
        table::TableBuilder,
    },
    utils::logging,
};
use anyhow::{bail, Context, Result};
use colored::*;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How a command ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// At least one pipeline finished `Aborted`.
    Aborted,
}

pub async fn run(cli: Cli) -> Result<Outcome> {
    let level = logging::level_from_cli(&cli);
    logging::init(level)?;

    match &cli.command {
        Commands::Init { path, force } => init_config(path, *force),
        Commands::Tools => {
            let session = Session::load(&cli)?;
            let checker = ToolChecker::new(&session.env);
            let report = checker.check_all_tools(session.registry.all());
            println!("{}", TableBuilder::tool_availability(&report));
            println!("{}", checker.get_installation_summary(&report));
            Ok(Outcome::Success)
        }
        Commands::Workflows => {
            let session = Session::load(&cli)?;
            println!("{}", TableBuilder::workflows(&session.catalog));
            Ok(Outcome::Success)
        }
        Commands::Run(args) => {
            let session = Session::load(&cli)?;
            run_workflow(args, session, cli.verbose || cli.debug).await
        }
    }
}

/// Config plus everything derived from it, validated before any command
/// touches a tool.
struct Session {
    config: GlobalConfig,
    env: ExecEnv,
    registry: ToolRegistry,
    catalog: WorkflowCatalog,
}

impl Session {
    fn load(cli: &Cli) -> Result<Self> {
        let config = ConfigLoader::load_with_custom_path(cli.config.as_deref())?;
        let env = ExecEnv::from_config(
            &config.exec,
            std::env::current_dir().context("Failed to read the current directory")?,
        );
        let registry = ToolRegistry::with_config(&config)?;
        let catalog = WorkflowCatalog::builtin().with_user(&config.workflows);
        catalog.validate(&registry)?;
        tracing::debug!(
            "Loaded {} tools and {} workflows",
            registry.all().len(),
            catalog.iter().count()
        );
        Ok(Self {
            config,
            env,
            registry,
            catalog,
        })
    }
}

fn init_config(path: &Path, force: bool) -> Result<Outcome> {
    if path.exists() && !force {
        bail!("{:?} already exists; pass --force to overwrite it", path);
    }
    ConfigLoader::generate_template(path)?;
    println!("{} {}", "Wrote".green(), path.display());
    Ok(Outcome::Success)
}

/// One workflow's steps, ready to run against every target.
struct Batch {
    name: String,
    steps: Vec<String>,
    sequencer: Sequencer,
}

/// `(name, steps)` per workflow to run; `--tools` is a single batch.
fn select_batches(args: &RunArgs, catalog: &WorkflowCatalog) -> Result<Vec<(String, Vec<String>)>> {
    match (&args.workflow, &args.tools) {
        (Some(name), _) => Ok(catalog
            .resolve(name)?
            .into_iter()
            .map(|w| (w.name.clone(), w.steps.clone()))
            .collect()),
        (None, Some(list)) => Ok(vec![("tools".to_string(), parse_tool_list(list))]),
        (None, None) => bail!("pass --workflow or --tools"),
    }
}

async fn run_workflow(args: &RunArgs, session: Session, show_stderr: bool) -> Result<Outcome> {
    let Session {
        config,
        env,
        registry,
        catalog,
    } = session;
    let selected = select_batches(args, &catalog)?;
    let targets = collect_targets(args)?;
    let workers = args.workers.unwrap_or(config.run.workers);
    if workers == 0 {
        bail!("--workers must be greater than 0");
    }
    if args.timeout == Some(0) {
        bail!("--timeout must be greater than 0");
    }

    let options = pipeline_options(args, config, env)?;
    let registry = Arc::new(registry);
    let several = selected.len() > 1;
    let mut batches = Vec::with_capacity(selected.len());
    for (name, steps) in selected {
        let mut options = options.clone();
        if several {
            // Each workflow keeps its own result tree.
            options.builder.output_root = options.builder.output_root.join(&name);
        }
        let sequencer = Sequencer::new(registry.clone(), options);
        let plans = targets
            .iter()
            .map(|target| sequencer.plan(steps.as_slice(), target))
            .collect::<Result<Vec<_>, _>>()?;

        println!(
            "{} {} step(s) of {} for {} target(s)",
            "Plan:".cyan().bold(),
            steps.len(),
            name.cyan(),
            targets.len()
        );
        println!("{}", TableBuilder::plan(&plans[0]));
        batches.push(Batch { name, steps, sequencer });
    }
    if targets.len() > 1 {
        println!("(shown for {}; the other targets run the same steps)", targets[0].canonical);
    }
    if !args.yes && !confirm("Run these commands?")? {
        println!("{}", "Nothing was run.".yellow());
        return Ok(Outcome::Success);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping running tools");
            on_signal.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel::<PipelineEvent>();
    let printer = EventPrinter::new(
        TargetProgress::new(targets.len() * batches.len()),
        show_stderr,
        targets.len() > 1,
    );
    let printer_task = tokio::spawn(printer.run(rx));

    let mut finished: Vec<(String, Vec<PipelineResult>)> = Vec::with_capacity(batches.len());
    let mut failure = None;
    for batch in batches {
        if cancel.is_cancelled() {
            tracing::warn!("Skipping workflow {}: cancelled", batch.name);
            continue;
        }
        if several {
            tracing::info!("Running workflow {}", batch.name);
        }
        match batch
            .sequencer
            .run_many(&batch.steps, targets.clone(), workers, &cancel, Some(tx.clone()))
            .await
        {
            Ok(results) => finished.push((batch.name, results)),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    drop(tx);
    if let Err(e) = printer_task.await {
        tracing::warn!("Console printer stopped: {}", e);
    }

    let results: Vec<PipelineResult> = finished
        .iter()
        .flat_map(|(_, results)| results.iter().cloned())
        .collect();
    for result in &results {
        if let Err(e) = reporters::report(result) {
            tracing::warn!("Summary for {} not written: {:#}", result.target, e);
        }
    }
    if let Some(e) = failure {
        return Err(e.into());
    }
    printer::print_summary(&results);
    if several {
        printer::print_workflow_totals(&finished);
    }

    if cancel.is_cancelled() || results.iter().any(|r| r.is_aborted()) {
        Ok(Outcome::Aborted)
    } else {
        Ok(Outcome::Success)
    }
}

fn pipeline_options(args: &RunArgs, config: GlobalConfig, env: ExecEnv) -> Result<PipelineOptions> {
    let explicit_flags = args
        .flags
        .as_deref()
        .map(shell_words::split)
        .transpose()
        .context("Failed to parse --flags")?;
    let speed = match &args.speed {
        Some(raw) => parse_speed(raw),
        None => parse_speed(&config.run.speed_text()),
    };

    let builder = CommandBuilder {
        speed,
        flag_mode: args.flags_mode.map(Into::into).unwrap_or(config.run.flag_mode),
        explicit_flags,
        wordlists: config.wordlists,
        wordlist_override: args.wordlist.clone(),
        ..CommandBuilder::new(args.output.clone().unwrap_or(config.run.output_root))
    };
    tracing::debug!("Command builder: {:?}", builder);

    Ok(PipelineOptions {
        builder,
        env,
        default_timeout: Duration::from_secs(config.run.timeout_secs),
        timeout_override: args.timeout.map(Duration::from_secs),
        keep_scratch: args.keep_scratch || config.run.keep_scratch,
    })
}

/// Normalized targets in input order, duplicates dropped.
fn collect_targets(args: &RunArgs) -> Result<Vec<Target>> {
    let raws = match (&args.target, &args.targets_file) {
        (Some(raw), _) => vec![raw.clone()],
        (None, Some(path)) => read_targets_file(path)?,
        (None, None) => bail!("pass --target or --targets-file"),
    };

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(raws.len());
    for raw in &raws {
        let target = match args.mode.focus() {
            Some(mode) => normalize(raw, mode)?,
            None => normalize_auto(raw)?,
        };
        if seen.insert(target.canonical.clone()) {
            targets.push(target);
        } else {
            tracing::info!("Skipping duplicate target {}", raw);
        }
    }
    if targets.is_empty() {
        bail!("no targets to run");
    }
    Ok(targets)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().lock().read_line(&mut response)?;
    let response = response.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}
