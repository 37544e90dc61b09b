use super::builder::BuiltCommand;
use super::env::ExecEnv;
use crate::core::command::Command;
use crate::core::events::{Emitter, Stream};
use crate::core::models::{ArtifactKind, RunResult, StepStatus};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long readers and reaping may take once the child is gone or killed.
const GRACE: Duration = Duration::from_secs(2);

/// Enables `pipefail` in shells that have it, so any failing stage fails
/// the pipeline.
const PIPEFAIL: &str = "(set -o pipefail) 2>/dev/null && set -o pipefail; ";

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Runs one built command to completion, timeout or cancellation.
///
/// Never fails: every outcome, including a missing binary, is a
/// [`StepStatus`] in the returned [`RunResult`].
pub async fn run(
    built: &BuiltCommand,
    env: &ExecEnv,
    timeout: Duration,
    cancel: &CancellationToken,
    emitter: &Emitter,
) -> RunResult {
    let started = Instant::now();
    let mut result = RunResult {
        tool: built.tool.clone(),
        status: StepStatus::Success,
        exit_code: None,
        duration_ms: 0,
        command: built.to_string(),
        input: built.input.clone(),
        artifact: None,
        output_lines: 0,
        records: None,
    };

    let mut process = match prepare(&built.command, env) {
        Ok(process) => process,
        Err(binary) => {
            tracing::warn!("{}: '{}' not found on PATH, skipping", built.tool, binary);
            result.status = StepStatus::BinaryNotFound { binary };
            return result;
        }
    };

    let sink = match stage_files(built, &mut process).await {
        Ok(sink) => sink,
        Err(e) => {
            tracing::warn!("{}: cannot prepare {:?}: {}", built.tool, built.artifact, e);
            result.status = StepStatus::ToolFailure { exit_code: None };
            result.duration_ms = started.elapsed().as_millis();
            return result;
        }
    };

    tracing::debug!("Executing {}: {}", built.tool, result.command);
    let mut child = match process.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!("{}: failed to spawn: {}", built.tool, e);
            result.status = StepStatus::ToolFailure { exit_code: None };
            result.duration_ms = started.elapsed().as_millis();
            return result;
        }
    };
    let pid = child.id();

    let stdout = child
        .stdout
        .take()
        .map(|out| spawn_reader(out, Stream::Stdout, &built.tool, emitter, sink));
    let stderr = child
        .stderr
        .take()
        .map(|err| spawn_reader(err, Stream::Stderr, &built.tool, emitter, None));

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
        _ = cancel.cancelled() => Outcome::Cancelled,
    };

    result.status = match outcome {
        Outcome::Exited(Ok(status)) => {
            result.exit_code = status.code();
            if status.success() {
                StepStatus::Success
            } else {
                StepStatus::ToolFailure {
                    exit_code: status.code(),
                }
            }
        }
        Outcome::Exited(Err(e)) => {
            tracing::warn!("{}: wait failed: {}", built.tool, e);
            StepStatus::ToolFailure { exit_code: None }
        }
        Outcome::TimedOut => {
            tracing::warn!("{} timed out after {:?}, killing", built.tool, timeout);
            kill_tree(&mut child, pid);
            reap(&mut child).await;
            StepStatus::Timeout {
                after_ms: timeout.as_millis(),
            }
        }
        Outcome::Cancelled => {
            tracing::info!("{} cancelled, killing", built.tool);
            kill_tree(&mut child, pid);
            reap(&mut child).await;
            StepStatus::Cancelled
        }
    };

    result.output_lines = join_readers(&mut child, pid, [stdout, stderr], &built.tool).await;
    result.duration_ms = started.elapsed().as_millis();
    result.artifact = produced_artifact(&built.artifact, &result.status);

    tracing::info!(
        "{} finished: {} in {:.1}s",
        built.tool,
        result.status.label(),
        result.duration().as_secs_f64()
    );
    result
}

/// Resolves every program up front; `Err` carries the first missing name.
fn prepare(command: &Command, env: &ExecEnv) -> Result<ProcessCommand, String> {
    let mut process = match command {
        Command::ArgVector { program, args } => {
            let path = env.resolve(program).ok_or_else(|| program.clone())?;
            let mut process = ProcessCommand::new(path);
            process.args(args);
            process
        }
        Command::ShellPipeline { .. } => {
            for program in command.programs() {
                if env.resolve(program).is_none() {
                    return Err(program.to_string());
                }
            }
            let shell = env.resolve(&env.shell).ok_or_else(|| env.shell.clone())?;
            let mut process = ProcessCommand::new(shell);
            process.arg("-c").arg(format!("{}{}", PIPEFAIL, command.script()));
            process
        }
    };

    process
        .env_clear()
        .envs(&env.vars)
        .current_dir(&env.workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so a timeout can take down grandchildren too.
    #[cfg(unix)]
    process.process_group(0);

    Ok(process)
}

/// Removes whatever an earlier run left at the artifact path, then wires
/// the stdin file and, for stdout tools, opens the capture file.
async fn stage_files(
    built: &BuiltCommand,
    process: &mut ProcessCommand,
) -> std::io::Result<Option<tokio::fs::File>> {
    clear_artifact(&built.artifact)?;
    if built.produces == ArtifactKind::Directory {
        std::fs::create_dir_all(&built.artifact)?;
    }
    if let Some(path) = &built.stdin {
        process.stdin(Stdio::from(std::fs::File::open(path)?));
    }
    if built.capture_stdout {
        return Ok(Some(tokio::fs::File::create(&built.artifact).await?));
    }
    Ok(None)
}

fn clear_artifact(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// The artifact this run left. A failed step's empty file or directory is
/// removed rather than reported.
fn produced_artifact(path: &Path, status: &StepStatus) -> Option<PathBuf> {
    let meta = std::fs::symlink_metadata(path).ok()?;
    if !status.is_success() {
        let discarded = if meta.is_dir() {
            std::fs::remove_dir(path).is_ok()
        } else {
            meta.len() == 0 && std::fs::remove_file(path).is_ok()
        };
        if discarded {
            return None;
        }
    }
    Some(path.to_path_buf())
}

fn spawn_reader<R>(
    reader: R,
    stream: Stream,
    tool: &str,
    emitter: &Emitter,
    mut sink: Option<tokio::fs::File>,
) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let tool = tool.to_string();
    let emitter = emitter.clone();
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut count = 0;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let failed = match sink.as_mut() {
                        Some(file) => file.write_all(&buf).await.err(),
                        None => None,
                    };
                    if let Some(e) = failed {
                        tracing::warn!("{}: cannot write captured output: {}", tool, e);
                        sink = None;
                    }
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    count += 1;
                    emitter.output(&tool, stream, line.to_string());
                }
                Err(e) => {
                    tracing::debug!("{}: {:?} read error: {}", tool, stream, e);
                    break;
                }
            }
        }
        if let Some(mut file) = sink {
            if let Err(e) = file.flush().await {
                tracing::warn!("{}: cannot flush captured output: {}", tool, e);
            }
        }
        count
    })
}

/// Waits for both readers. Descendants that keep the pipes open past the
/// grace period are killed and their readers dropped.
async fn join_readers(
    child: &mut Child,
    pid: Option<u32>,
    readers: [Option<JoinHandle<usize>>; 2],
    tool: &str,
) -> usize {
    let aborts: Vec<_> = readers.iter().flatten().map(|h| h.abort_handle()).collect();
    let joined = tokio::time::timeout(GRACE, async move {
        let mut total = 0;
        for handle in readers.into_iter().flatten() {
            total += handle.await.unwrap_or(0);
        }
        total
    })
    .await;

    match joined {
        Ok(total) => total,
        Err(_) => {
            tracing::warn!("{}: output still open after exit, killing process group", tool);
            kill_tree(child, pid);
            for abort in aborts {
                abort.abort();
            }
            0
        }
    }
}

fn kill_tree(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // The child leads its own group, so its pid is the group id.
            unsafe {
                libc::killpg(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
    let _ = child.start_kill();
}

async fn reap(child: &mut Child) {
    if tokio::time::timeout(GRACE, child.wait()).await.is_err() {
        tracing::warn!("child did not exit within {:?} of SIGKILL", GRACE);
    }
}
