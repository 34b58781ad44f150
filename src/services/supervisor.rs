//! Attempt supervisor.
//!
//! Runs one worker process in its own process group and turns whatever
//! happens to it into an [`AttemptResult`]. Timeouts and shutdown are
//! enforced on the whole group so grandchildren never outlive the attempt.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AttemptResult, AttemptSpec, AttemptStatus, COMPLETION_MARKER};
use crate::infrastructure::process::{kill_group, signal_group, wait_exited, ShutdownToken};

const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Launches and supervises attempt processes.
#[derive(Debug, Clone, Copy)]
pub struct AttemptSupervisor {
    drain_timeout: Duration,
}

impl Default for AttemptSupervisor {
    fn default() -> Self {
        Self {
            drain_timeout: OUTPUT_DRAIN_TIMEOUT,
        }
    }
}

impl AttemptSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long captured pipes may stay open once the worker has exited.
    #[must_use]
    pub const fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Run `spec` to a terminal status. Never fails: spawn and I/O errors
    /// become a `Failed` result carrying the error text in `stderr`.
    #[instrument(skip_all, fields(attempt = spec.id))]
    pub async fn run(&self, spec: &AttemptSpec, shutdown: &ShutdownToken) -> AttemptResult {
        let started = Instant::now();
        let mut result = match self.supervise(spec, shutdown).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, program = %spec.program.display(), "attempt could not be run");
                let mut failed =
                    AttemptResult::new(spec.id, AttemptStatus::Failed { code: None }, spec.log_path.clone());
                failed.stderr = err.to_string();
                failed
            }
        };
        result.elapsed = started.elapsed();

        info!(
            status = result.status.as_str(),
            exit_code = ?result.exit_code,
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "attempt finished"
        );
        result
    }

    async fn supervise(&self, spec: &AttemptSpec, shutdown: &ShutdownToken) -> DomainResult<AttemptResult> {
        prepare_log(&spec.log_path).await?;
        if shutdown.is_cancelled() {
            return Ok(AttemptResult::cancelled_before_start(spec.id, spec.log_path.clone()));
        }

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DomainError::Io(format!("failed to spawn {}: {e}", spec.program.display())))?;

        let pgid = child
            .id()
            .ok_or_else(|| DomainError::Io("child exited before its pid was read".to_string()))?;
        debug!(pgid, args = ?spec.args, "attempt spawned");

        let stdout = Arc::new(Mutex::new(String::new()));
        let stderr = Arc::new(Mutex::new(String::new()));
        let readers = [
            spawn_reader(child.stdout.take(), Arc::clone(&stdout)),
            spawn_reader(child.stderr.take(), Arc::clone(&stderr)),
        ];

        let deadline = async {
            match spec.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let (exit, forced) = tokio::select! {
            exited = wait_exited(pgid) => {
                exited?;
                (Self::reap_after_exit(&mut child, pgid).await?, None)
            }
            () = deadline => {
                let seconds = spec.timeout.map_or(0, |t| t.as_secs());
                warn!(pgid, error = %DomainError::TimeoutExceeded { seconds }, "killing process group");
                (Self::kill_and_reap(&mut child, pgid).await?, Some(AttemptStatus::TimedOut))
            }
            () = shutdown.cancelled() => {
                let signal = shutdown.signal();
                info!(pgid, %signal, grace_ms = u64::try_from(spec.grace_period.as_millis()).unwrap_or(u64::MAX), "forwarding shutdown to process group");
                if let Err(err) = signal_group(pgid, signal) {
                    warn!(error = %err, "failed to forward shutdown signal");
                }
                let status = match tokio::time::timeout(spec.grace_period, wait_exited(pgid)).await {
                    Ok(exited) => {
                        exited?;
                        Self::reap_after_exit(&mut child, pgid).await?
                    }
                    Err(_) => {
                        debug!(pgid, "grace period expired, escalating to SIGKILL");
                        Self::kill_and_reap(&mut child, pgid).await?
                    }
                };
                (status, Some(AttemptStatus::Cancelled))
            }
        };

        drain(readers, pgid, self.drain_timeout).await;

        let stdout = take(&stdout);
        let stderr = take(&stderr);
        let marker_found = stdout.contains(COMPLETION_MARKER) || log_has_marker(&spec.log_path).await;

        let status = if marker_found {
            AttemptStatus::Succeeded
        } else {
            forced.unwrap_or_else(|| AttemptStatus::from_exit(false, exit.code()))
        };
        if let AttemptStatus::Failed { code } = status {
            debug!(error = %DomainError::ProcessFailure { code }, "attempt failed");
        }

        let mut result = AttemptResult::new(spec.id, status, spec.log_path.clone());
        result.exit_code = exit.code();
        result.stdout = stdout;
        result.stderr = stderr;
        Ok(result)
    }

    /// The leader has exited but is not reaped yet, so `pgid` still names its
    /// group. Members left behind must not outlive the attempt.
    async fn reap_after_exit(child: &mut Child, pgid: u32) -> DomainResult<ExitStatus> {
        if let Err(err) = kill_group(pgid) {
            debug!(pgid, error = %err, "failed to kill remaining group members");
        }
        Ok(child.wait().await?)
    }

    async fn kill_and_reap(child: &mut Child, pgid: u32) -> DomainResult<ExitStatus> {
        if let Err(err) = kill_group(pgid) {
            warn!(error = %err, "SIGKILL to process group failed, killing leader");
            child.start_kill()?;
        }
        Ok(child.wait().await?)
    }
}

/// Start the attempt with an empty log and make sure its directory exists.
async fn prepare_log(log_path: &Path) -> DomainResult<()> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            DomainError::Io(format!("failed to create log directory {}: {e}", parent.display()))
        })?;
    }
    tokio::fs::File::create(log_path)
        .await
        .map_err(|e| DomainError::Io(format!("failed to create {}: {e}", log_path.display())))?;
    Ok(())
}

fn spawn_reader<R>(pipe: Option<R>, sink: Arc<Mutex<String>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(pipe) = pipe else { return };
        let mut reader = BufReader::new(pipe);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_str(&String::from_utf8_lossy(&line)),
            }
        }
    })
}

/// Wait for both pipes to close. The group is already dead by now, but a
/// process that left it can still hold them open; readers are abandoned
/// after the drain timeout.
async fn drain(readers: [JoinHandle<()>; 2], pgid: u32, timeout: Duration) {
    let aborts = readers.each_ref().map(JoinHandle::abort_handle);
    let [out, err] = readers;
    let wait = async {
        let _ = out.await;
        let _ = err.await;
    };
    if tokio::time::timeout(timeout, wait).await.is_err() {
        warn!(pgid, "output still open after exit, abandoning readers");
        for abort in aborts {
            abort.abort();
        }
    }
}

fn take(buffer: &Mutex<String>) -> String {
    std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner))
}

async fn log_has_marker(log_path: &Path) -> bool {
    tokio::fs::read(log_path)
        .await
        .is_ok_and(|bytes| String::from_utf8_lossy(&bytes).contains(COMPLETION_MARKER))
}
