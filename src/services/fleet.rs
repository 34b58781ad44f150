//! Fleet coordinator.
//!
//! Fans N attempts out over at most `max_workers` concurrent supervisors and
//! aggregates their results. Under [`FleetPolicy::FirstSuccessExit`] the
//! first success cancels the fleet token: running attempts get the shutdown
//! signal and a grace period, queued attempts never start.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{
    AttemptResult, AttemptSpec, AttemptStatus, FleetConfig, FleetPolicy, FleetReport, InputAssignment,
};
use crate::infrastructure::process::ShutdownToken;
use crate::services::supervisor::AttemptSupervisor;

/// Extra time granted to stragglers beyond the grace period before their
/// tasks are aborted.
const STRAGGLER_MARGIN: Duration = Duration::from_secs(1);

/// Builds the launch spec of attempt `id` (1-based).
pub trait AttemptLauncher: Send + Sync {
    fn spec(&self, id: usize) -> AttemptSpec;
}

impl<F> AttemptLauncher for F
where
    F: Fn(usize) -> AttemptSpec + Send + Sync,
{
    fn spec(&self, id: usize) -> AttemptSpec {
        self(id)
    }
}

/// Launches `proofloop solve` workers.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    program: PathBuf,
    assignment: InputAssignment,
    log_dir: PathBuf,
    timeout: Option<Duration>,
    grace_period: Duration,
    other_prompts: Vec<String>,
    config_path: Option<PathBuf>,
    checkpoint_dir: Option<PathBuf>,
}

impl WorkerLauncher {
    pub fn new(program: impl Into<PathBuf>, assignment: InputAssignment, fleet: &FleetConfig) -> Self {
        Self {
            program: program.into(),
            assignment,
            log_dir: fleet.log_dir.clone(),
            timeout: fleet.timeout_secs.map(Duration::from_secs),
            grace_period: Duration::from_millis(fleet.grace_period_ms),
            other_prompts: Vec::new(),
            config_path: None,
            checkpoint_dir: None,
        }
    }

    #[must_use]
    pub fn with_other_prompts(mut self, other_prompts: Vec<String>) -> Self {
        self.other_prompts = other_prompts;
        self
    }

    /// Pass `--config` through to every worker.
    #[must_use]
    pub fn with_config_path(mut self, config_path: Option<PathBuf>) -> Self {
        self.config_path = config_path;
        self
    }

    /// Give every worker its own checkpoint key under `dir`.
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.checkpoint_dir = dir;
        self
    }

    pub fn log_path(&self, id: usize) -> PathBuf {
        self.log_dir.join(format!("attempt_{id:02}.log"))
    }

    /// Worker command line for attempt `id`.
    pub fn args(&self, id: usize) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config) = &self.config_path {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        args.push("solve".to_string());

        match &self.assignment {
            InputAssignment::Shared { problem_file } => {
                args.push(problem_file.display().to_string());
            }
            InputAssignment::Benchmark {
                csv,
                start_index,
                level,
            } => {
                args.push("--benchmark".to_string());
                args.push(csv.display().to_string());
                args.push("--benchmark-index".to_string());
                args.push((start_index + id - 1).to_string());
                if let Some(level) = level {
                    args.push("--level".to_string());
                    args.push(level.clone());
                }
            }
        }

        args.push("--log".to_string());
        args.push(self.log_path(id).display().to_string());

        if !self.other_prompts.is_empty() {
            args.push("--other-prompts".to_string());
            args.push(self.other_prompts.join(","));
        }
        if let Some(dir) = &self.checkpoint_dir {
            args.push("--checkpoint-dir".to_string());
            args.push(dir.display().to_string());
            args.push("--checkpoint-key".to_string());
            args.push(format!("attempt_{id:02}"));
        }
        args
    }
}

impl AttemptLauncher for WorkerLauncher {
    fn spec(&self, id: usize) -> AttemptSpec {
        AttemptSpec::new(id, self.program.clone(), self.args(id), self.log_path(id))
            .with_timeout(self.timeout)
            .with_grace_period(self.grace_period)
    }
}

/// Runs a fleet of supervised attempts.
pub struct FleetCoordinator {
    launcher: Arc<dyn AttemptLauncher>,
    supervisor: AttemptSupervisor,
    num_attempts: usize,
    max_workers: usize,
    grace_period: Duration,
    shutdown: ShutdownToken,
}

impl FleetCoordinator {
    /// `shutdown` is the process-wide token; the fleet cancels only a child
    /// of it.
    pub fn new(launcher: Arc<dyn AttemptLauncher>, config: &FleetConfig, shutdown: ShutdownToken) -> Self {
        Self {
            launcher,
            supervisor: AttemptSupervisor::new(),
            num_attempts: config.num_attempts,
            max_workers: config.effective_max_workers(),
            grace_period: Duration::from_millis(config.grace_period_ms),
            shutdown,
        }
    }

    #[must_use]
    pub const fn with_supervisor(mut self, supervisor: AttemptSupervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Run every attempt under `policy`. Individual failures are reported,
    /// never raised.
    #[instrument(skip_all, fields(fleet_id = %Uuid::new_v4(), attempts = self.num_attempts, max_workers = self.max_workers, policy = ?policy))]
    pub async fn run(&self, policy: FleetPolicy) -> FleetReport {
        let started = Instant::now();
        let fleet_token = self.shutdown.child();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut join_set = JoinSet::new();
        let mut launched: HashMap<tokio::task::Id, (usize, PathBuf)> = HashMap::new();

        info!("starting fleet");
        for id in 1..=self.num_attempts {
            let spec = self.launcher.spec(id);
            let semaphore = Arc::clone(&semaphore);
            let token = fleet_token.clone();
            let supervisor = self.supervisor;
            let meta = (spec.id, spec.log_path.clone());

            let handle = join_set.spawn(async move {
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit.ok(),
                    () = token.cancelled() => None,
                };
                let Some(_permit) = permit else {
                    debug!(attempt = spec.id, "attempt cancelled before start");
                    return AttemptResult::cancelled_before_start(spec.id, spec.log_path);
                };
                supervisor.run(&spec, &token).await
            });
            launched.insert(handle.id(), meta);
        }

        let mut results = Vec::with_capacity(self.num_attempts);
        let mut winner = None;

        while let Some(joined) = join_set.join_next_with_id().await {
            let result = Self::collect(joined, &launched);
            if result.success && winner.is_none() {
                info!(attempt = result.id, log = %result.log_path.display(), "attempt succeeded");
                winner = Some(result.id);
            }
            let stop = winner.is_some() && policy == FleetPolicy::FirstSuccessExit;
            results.push(result);
            if stop {
                break;
            }
        }

        if !join_set.is_empty() {
            info!(remaining = join_set.len(), "first success, cancelling remaining attempts");
            fleet_token.trigger(Signal::SIGTERM);

            let deadline = tokio::time::Instant::now() + self.grace_period + STRAGGLER_MARGIN;
            loop {
                match tokio::time::timeout_at(deadline, join_set.join_next_with_id()).await {
                    Ok(Some(joined)) => results.push(Self::collect(joined, &launched)),
                    Ok(None) => break,
                    Err(_) => {
                        warn!(remaining = join_set.len(), "stragglers outlived the grace period, aborting");
                        join_set.abort_all();
                        while let Some(joined) = join_set.join_next_with_id().await {
                            results.push(Self::collect(joined, &launched));
                        }
                        break;
                    }
                }
            }
        }

        let report = FleetReport::from_results(results, started.elapsed(), winner);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            timed_out = report.timed_out,
            cancelled = report.cancelled,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "fleet finished"
        );
        report
    }

    fn collect(
        joined: Result<(tokio::task::Id, AttemptResult), JoinError>,
        launched: &HashMap<tokio::task::Id, (usize, PathBuf)>,
    ) -> AttemptResult {
        match joined {
            Ok((_, result)) => result,
            Err(err) => {
                let (id, log_path) = launched.get(&err.id()).cloned().unwrap_or_default();
                if err.is_cancelled() {
                    AttemptResult::new(id, AttemptStatus::Cancelled, log_path)
                } else {
                    warn!(attempt = id, error = %err, "attempt task panicked");
                    let mut failed = AttemptResult::new(id, AttemptStatus::Failed { code: None }, log_path);
                    failed.stderr = err.to_string();
                    failed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet_config(attempts: usize) -> FleetConfig {
        FleetConfig {
            num_attempts: attempts,
            log_dir: PathBuf::from("/var/tmp/proofloop"),
            timeout_secs: Some(60),
            grace_period_ms: 250,
            ..Default::default()
        }
    }

    #[test]
    fn test_shared_problem_args() {
        let launcher = WorkerLauncher::new(
            "/usr/bin/proofloop",
            InputAssignment::Shared {
                problem_file: PathBuf::from("problem.md"),
            },
            &fleet_config(3),
        )
        .with_other_prompts(vec!["a".to_string(), "b".to_string()]);

        let spec = launcher.spec(2);
        assert_eq!(spec.id, 2);
        assert_eq!(spec.log_path, PathBuf::from("/var/tmp/proofloop/attempt_02.log"));
        assert_eq!(spec.timeout, Some(Duration::from_secs(60)));
        assert_eq!(spec.grace_period, Duration::from_millis(250));
        assert_eq!(
            spec.args,
            vec![
                "solve",
                "problem.md",
                "--log",
                "/var/tmp/proofloop/attempt_02.log",
                "--other-prompts",
                "a,b"
            ]
        );
    }

    #[test]
    fn test_benchmark_rows_follow_attempt_id() {
        let launcher = WorkerLauncher::new(
            "proofloop",
            InputAssignment::Benchmark {
                csv: PathBuf::from("bench.csv"),
                start_index: 10,
                level: Some("Basic".to_string()),
            },
            &fleet_config(3),
        )
        .with_config_path(Some(PathBuf::from("cfg.yaml")))
        .with_checkpoint_dir(Some(PathBuf::from("ckpt")));

        let args = launcher.args(3);
        assert_eq!(&args[..3], ["--config", "cfg.yaml", "solve"]);
        let index = args.iter().position(|a| a == "--benchmark-index").unwrap();
        assert_eq!(args[index + 1], "12");
        assert!(args.windows(2).any(|w| w == ["--level", "Basic"]));
        assert!(args.windows(2).any(|w| w == ["--checkpoint-key", "attempt_03"]));
    }

    #[tokio::test]
    async fn test_run_to_completion_collects_everything() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_path_buf();
        let launcher = move |id: usize| {
            let script = if id % 2 == 0 { "exit 2" } else { "exit 5" };
            AttemptSpec::new(
                id,
                "sh",
                vec!["-c".to_string(), script.to_string()],
                log_dir.join(format!("attempt_{id:02}.log")),
            )
        };
        let config = FleetConfig {
            num_attempts: 4,
            max_workers: Some(2),
            ..Default::default()
        };

        let report = FleetCoordinator::new(Arc::new(launcher), &config, ShutdownToken::new())
            .run(FleetPolicy::RunToCompletion)
            .await;

        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 4);
        assert!(report.winning_id.is_none());
        assert_eq!(
            report.results.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(report.results[1].status, AttemptStatus::Exhausted);
        assert_eq!(report.results[2].status, AttemptStatus::Failed { code: Some(5) });
    }
}
