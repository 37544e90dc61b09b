use super::merge::{clean_urls, count_records, head_lines, merge_artifacts, write_placeholder};
use super::workflows::validate_steps;
use crate::core::errors::{BugxError, BugxResult};
use crate::core::events::{Emitter, EventSender, PipelineEvent};
use crate::core::models::{ArtifactKind, FailurePolicy, PipelineResult, RunResult, StepStatus};
use crate::core::state::PipelineState;
use crate::core::target::Target;
use crate::executors::builder::{BuiltCommand, CommandBuilder};
use crate::executors::env::ExecEnv;
use crate::executors::runner;
use crate::organizers::layout;
use crate::tools::registry::{ToolDescriptor, ToolRegistry};
use crate::utils::fs::atomic_write;
use crate::utils::time::new_run_id;
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Settings shared by every pipeline of one invocation.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub builder: CommandBuilder,
    pub env: ExecEnv,
    /// Used when neither the CLI nor the descriptor sets a timeout.
    pub default_timeout: Duration,
    /// `--timeout`, wins over everything else.
    pub timeout_override: Option<Duration>,
    pub keep_scratch: bool,
}

/// A step as it would run, for the confirmation preview.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub index: usize,
    pub tool: String,
    pub command: String,
    pub input: Option<PathBuf>,
    pub artifact: PathBuf,
    pub timeout_secs: u64,
}

/// List artifacts produced since the last list consumer ran.
#[derive(Debug, Default)]
struct ArtifactThread {
    lists: Vec<(ArtifactKind, PathBuf)>,
}

impl ArtifactThread {
    fn candidates(&self, tool: &ToolDescriptor) -> Vec<PathBuf> {
        self.lists
            .iter()
            .filter(|(kind, _)| tool.accepts(*kind))
            .map(|(_, path)| path.clone())
            .collect()
    }

    fn record(&mut self, tool: &ToolDescriptor, took_upstream: bool, artifact: PathBuf) {
        if !tool.produces.is_list() {
            return;
        }
        if tool.is_consumer() && took_upstream {
            self.lists.clear();
        }
        self.lists.push((tool.produces, artifact));
    }
}

enum InputSource {
    None,
    Upstream(Vec<PathBuf>),
    File(PathBuf),
    Seed(String),
}

fn input_source(tool: &ToolDescriptor, target: &Target, thread: &ArtifactThread) -> BugxResult<InputSource> {
    if !tool.is_consumer() {
        return Ok(InputSource::None);
    }
    let candidates = thread.candidates(tool);
    if !candidates.is_empty() {
        return Ok(InputSource::Upstream(candidates));
    }
    if let Some(file) = target.file() {
        return Ok(InputSource::File(file.to_path_buf()));
    }
    let seed = if tool.wants_urls_only() {
        target.url()
    } else {
        target.host.clone()
    };
    seed.map(InputSource::Seed).ok_or_else(|| {
        BugxError::invalid_target(
            &target.raw,
            format!("{} needs a list and this target cannot seed one", tool.id),
        )
    })
}

fn scratch_file(scratch: &Path, index: usize, tool: &ToolDescriptor, suffix: &str) -> PathBuf {
    scratch.join(format!("{:02}-{}.{}", index, tool.id, suffix))
}

/// Works out (and with `write`, materializes) the input list for a step.
/// Returns the path and whether it came from upstream artifacts.
fn stage_input(
    index: usize,
    tool: &ToolDescriptor,
    target: &Target,
    thread: &ArtifactThread,
    scratch: &Path,
    write: bool,
) -> BugxResult<(Option<PathBuf>, bool)> {
    let source = input_source(tool, target, thread)?;
    let took_upstream = matches!(source, InputSource::Upstream(_));

    let mut path = match source {
        InputSource::None => return Ok((None, false)),
        InputSource::File(path) => path,
        InputSource::Seed(line) => {
            let path = scratch_file(scratch, index, tool, "seed.txt");
            if write {
                atomic_write(&path, format!("{}\n", line).as_bytes())
                    .map_err(|e| BugxError::merge(&path, e))?;
            }
            path
        }
        InputSource::Upstream(mut candidates) if candidates.len() == 1 => {
            let path = candidates.remove(0);
            if write && !path.exists() {
                let placeholder = scratch_file(scratch, index, tool, "empty.txt");
                write_placeholder(&placeholder)?;
                placeholder
            } else {
                path
            }
        }
        InputSource::Upstream(candidates) => {
            let merged = scratch_file(scratch, index, tool, "merged.txt");
            if write {
                merge_artifacts(&candidates, &merged)?;
            }
            merged
        }
    };

    if tool.clean_input {
        let cleaned = scratch_file(scratch, index, tool, "clean.txt");
        if write {
            clean_urls(&path, &cleaned)?;
        }
        path = cleaned;
    }
    if let Some(limit) = tool.input_limit {
        let capped = scratch_file(scratch, index, tool, "head.txt");
        if write {
            head_lines(&path, limit, &capped)?;
        }
        path = capped;
    }

    Ok((Some(path), took_upstream))
}

/// Per-run values threaded through each step.
struct StepContext<'a> {
    target: &'a Target,
    scratch: &'a Path,
    total: usize,
    cancel: &'a CancellationToken,
    emitter: &'a Emitter,
}

/// Runs workflows: one target's steps strictly in order, several targets
/// side by side.
#[derive(Clone)]
pub struct Sequencer {
    registry: Arc<ToolRegistry>,
    options: Arc<PipelineOptions>,
}

impl Sequencer {
    pub fn new(registry: Arc<ToolRegistry>, options: PipelineOptions) -> Self {
        Self {
            registry,
            options: Arc::new(options),
        }
    }

    pub fn timeout_for(&self, tool: &ToolDescriptor) -> Duration {
        self.options
            .timeout_override
            .or_else(|| tool.timeout())
            .unwrap_or(self.options.default_timeout)
    }

    /// Renders every step without running anything. Surfaces every usage
    /// error a real run would hit, missing wordlist files included.
    pub fn plan<S: AsRef<str>>(&self, steps: &[S], target: &Target) -> BugxResult<Vec<PlannedStep>> {
        validate_steps(steps, &self.registry)?;
        let tools = self.registry.lookup_all(steps)?;
        let builder = &self.options.builder;
        self.registry
            .check_wordlists(&tools, &builder.wordlists, builder.wordlist_override.as_deref())?;
        let scratch = builder.target_dir(target).join(".scratch");

        let mut thread = ArtifactThread::default();
        let mut planned = Vec::with_capacity(tools.len());
        for (index, tool) in tools.into_iter().enumerate() {
            let (input, took_upstream) = stage_input(index, tool, target, &thread, &scratch, false)?;
            let built = builder.render(tool, target, input.as_deref())?;
            thread.record(tool, took_upstream, built.artifact.clone());
            planned.push(PlannedStep {
                index,
                tool: tool.id.clone(),
                command: built.to_string(),
                input,
                artifact: built.artifact,
                timeout_secs: self.timeout_for(tool).as_secs(),
            });
        }
        Ok(planned)
    }

    /// Runs `steps` against `target`.
    ///
    /// Usage errors come back as `Err` before anything is spawned. After
    /// that the result is always `Ok`: tool failures live in the step
    /// results, and merge errors or cancellation end in `Aborted`.
    pub async fn run_pipeline<S: AsRef<str>>(
        &self,
        steps: &[S],
        target: &Target,
        cancel: &CancellationToken,
        events: Option<EventSender>,
    ) -> BugxResult<PipelineResult> {
        self.plan(steps, target)?;
        let tools = self.registry.lookup_all(steps)?;
        let builder = &self.options.builder;

        let started = Instant::now();
        let emitter = Emitter::new(target.canonical.clone(), events);
        let target_dir = builder.target_dir(target);
        let mut result = PipelineResult {
            target: target.canonical.clone(),
            slug: target.slug.clone(),
            run_id: new_run_id(&target.slug),
            output_dir: target_dir.clone(),
            steps: Vec::with_capacity(tools.len()),
            elapsed_ms: 0,
            state: PipelineState::Pending,
        };
        tracing::info!(
            "Starting {} ({} steps) for {}",
            result.run_id,
            tools.len(),
            target.canonical
        );

        let scratch = match layout::prepare_target_dir(&target_dir)
            .and_then(|_| layout::create_scratch(&target_dir))
        {
            Ok(scratch) => scratch,
            Err(e) => {
                tracing::error!("Cannot prepare {:?}: {}", target_dir, e);
                result
                    .state
                    .abort(format!("cannot prepare output directory {:?}: {}", target_dir, e));
                return Ok(self.finish(result, started, &emitter));
            }
        };

        let ctx = StepContext {
            target,
            scratch: scratch.path(),
            total: tools.len(),
            cancel,
            emitter: &emitter,
        };
        let mut thread = ArtifactThread::default();
        for (index, tool) in tools.iter().enumerate() {
            if cancel.is_cancelled() {
                result.state.abort("cancelled before step start");
                break;
            }
            result.state.advance(index);
            if let Err(reason) = self
                .run_step(index, tool, &ctx, &mut thread, &mut result.steps)
                .await
            {
                tracing::error!("Aborting pipeline for {}: {}", target.canonical, reason);
                result.state.abort(reason);
                break;
            }
        }
        result.state.complete();

        layout::finish_scratch(scratch, self.options.keep_scratch);
        Ok(self.finish(result, started, &emitter))
    }

    /// One step; `Err` carries the reason the whole pipeline must abort.
    async fn run_step(
        &self,
        index: usize,
        tool: &ToolDescriptor,
        ctx: &StepContext<'_>,
        thread: &mut ArtifactThread,
        steps: &mut Vec<RunResult>,
    ) -> Result<(), String> {
        let (input, took_upstream) = stage_input(index, tool, ctx.target, thread, ctx.scratch, true)
            .map_err(|e| e.to_string())?;
        let built = self
            .options
            .builder
            .build(tool, ctx.target, input.as_deref())
            .map_err(|e| format!("cannot prepare {}: {}", tool.id, e))?;

        ctx.emitter.emit(PipelineEvent::StepStarted {
            target: ctx.emitter.target().to_string(),
            index,
            total: ctx.total,
            tool: tool.id.clone(),
            command: built.to_string(),
        });

        let mut result = runner::run(
            &built,
            &self.options.env,
            self.timeout_for(tool),
            ctx.cancel,
            ctx.emitter,
        )
        .await;
        result.records = result
            .artifact
            .as_deref()
            .and_then(|path| count_records(path, tool.produces).ok());

        ctx.emitter.emit(PipelineEvent::StepFinished {
            target: ctx.emitter.target().to_string(),
            result: result.clone(),
        });

        let cancelled = result.status == StepStatus::Cancelled;
        let forwarded = settle_artifact(index, tool, &result, &built, ctx.scratch);
        steps.push(result);

        if cancelled {
            return Err("cancelled by user".to_string());
        }
        if let Some(path) = forwarded.map_err(|e| e.to_string())? {
            thread.record(tool, took_upstream, path);
        }
        Ok(())
    }

    fn finish(&self, mut result: PipelineResult, started: Instant, emitter: &Emitter) -> PipelineResult {
        result.elapsed_ms = started.elapsed().as_millis();
        tracing::info!(
            "{} finished as {:?}: {}/{} steps succeeded",
            result.run_id,
            result.state,
            result.succeeded(),
            result.steps.len()
        );
        emitter.emit(PipelineEvent::PipelineFinished {
            target: result.target.clone(),
            state: result.state.clone(),
        });
        result
    }

    /// Runs the same steps for many targets, at most `workers` at a time.
    ///
    /// Every target is planned first, so a usage error stops the batch
    /// before any tool starts. Targets whose slugs collide share an output
    /// directory and run one after another.
    pub async fn run_many(
        &self,
        steps: &[String],
        targets: Vec<Target>,
        workers: usize,
        cancel: &CancellationToken,
        events: Option<EventSender>,
    ) -> BugxResult<Vec<PipelineResult>> {
        for target in &targets {
            self.plan(steps, target)?;
        }

        let mut groups: Vec<Vec<Target>> = Vec::new();
        for target in targets {
            match groups.iter_mut().find(|g| g[0].slug == target.slug) {
                Some(group) => {
                    tracing::warn!(
                        "{} shares output directory '{}' with {}; running them in turn",
                        target.canonical,
                        target.slug,
                        group[0].canonical
                    );
                    group.push(target);
                }
                None => groups.push(vec![target]),
            }
        }

        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let steps = Arc::new(steps.to_vec());
        let mut handles = Vec::with_capacity(groups.len());
        for group in groups {
            let semaphore = semaphore.clone();
            let sequencer = self.clone();
            let steps = steps.clone();
            let cancel = cancel.clone();
            let events = events.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| BugxError::Aborted(e.to_string()))?;
                let mut results = Vec::with_capacity(group.len());
                for target in &group {
                    results.push(
                        sequencer
                            .run_pipeline(steps.as_slice(), target, &cancel, events.clone())
                            .await?,
                    );
                }
                Ok::<_, BugxError>(results)
            }));
        }

        let mut results = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(group) => results.extend(group?),
                Err(e) => return Err(BugxError::Aborted(format!("pipeline task failed: {}", e))),
            }
        }
        Ok(results)
    }
}

/// What a finished step hands downstream: its artifact, or a stand-in
/// chosen by the tool's failure policy.
fn settle_artifact(
    index: usize,
    tool: &ToolDescriptor,
    result: &RunResult,
    built: &BuiltCommand,
    scratch: &Path,
) -> BugxResult<Option<PathBuf>> {
    if !tool.produces.is_list() {
        return Ok(None);
    }
    if let Some(artifact) = result.artifact.as_ref().filter(|_| result.status.is_success()) {
        return Ok(Some(artifact.clone()));
    }
    if !result.status.is_success() && tool.failure_policy == FailurePolicy::Passthrough {
        if let Some(input) = &built.input {
            tracing::info!("{} {}: passing its input through", tool.id, result.status.label());
            return Ok(Some(input.clone()));
        }
    }
    let placeholder = scratch_file(scratch, index, tool, "empty.txt");
    write_placeholder(&placeholder)?;
    tracing::debug!("{} produced nothing; downstream gets {:?}", tool.id, placeholder);
    Ok(Some(placeholder))
}
