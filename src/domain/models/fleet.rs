//! Fleet models: termination policy, input assignment and the aggregate report.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::attempt::{AttemptResult, AttemptStatus};

/// When the coordinator stops waiting for attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetPolicy {
    /// Wait for every attempt regardless of early success.
    RunToCompletion,
    /// Cancel everything still running once one attempt succeeds.
    FirstSuccessExit,
}

impl FleetPolicy {
    pub const fn from_flag(exit_on_first_success: bool) -> Self {
        if exit_on_first_success {
            Self::FirstSuccessExit
        } else {
            Self::RunToCompletion
        }
    }
}

/// Which problem each attempt works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InputAssignment {
    /// Every attempt solves the same problem file.
    Shared { problem_file: PathBuf },
    /// Attempt `id` solves benchmark row `start_index + id - 1`.
    Benchmark {
        csv: PathBuf,
        start_index: usize,
        level: Option<String>,
    },
}

/// Aggregate outcome of one fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
    #[serde(with = "super::attempt::duration_millis")]
    pub elapsed: Duration,
    pub winning_id: Option<usize>,
    pub winning_log: Option<PathBuf>,
    pub results: Vec<AttemptResult>,
}

impl FleetReport {
    /// Aggregate per-attempt results. Without an explicit winner the first
    /// success in `results` order is used.
    pub fn from_results(mut results: Vec<AttemptResult>, elapsed: Duration, winner: Option<usize>) -> Self {
        let count = |pred: fn(&AttemptStatus) -> bool| results.iter().filter(|r| pred(&r.status)).count();
        let succeeded = count(|s| *s == AttemptStatus::Succeeded);
        let failed = count(|s| matches!(s, AttemptStatus::Failed { .. } | AttemptStatus::Exhausted));
        let timed_out = count(|s| *s == AttemptStatus::TimedOut);
        let cancelled = count(|s| *s == AttemptStatus::Cancelled);

        let winning_id = winner.or_else(|| results.iter().find(|r| r.success).map(|r| r.id));
        let winning_log = winning_id
            .and_then(|id| results.iter().find(|r| r.id == id))
            .map(|r| r.log_path.clone());

        results.sort_by_key(|r| r.id);

        Self {
            total: results.len(),
            succeeded,
            failed,
            timed_out,
            cancelled,
            elapsed,
            winning_id,
            winning_log,
            results,
        }
    }

    pub const fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    /// Result of the winning attempt, if any.
    pub fn winner(&self) -> Option<&AttemptResult> {
        let id = self.winning_id?;
        self.results.iter().find(|r| r.id == id)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }
}
