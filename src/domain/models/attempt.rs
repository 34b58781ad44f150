//! Attempt models: what a supervisor launches and what it reports back.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Line a worker prints to stdout once it holds an accepted solution.
pub const COMPLETION_MARKER: &str = "Found a correct solution in run";

/// Exit code of a worker that ran out of runs without a solution.
pub const EXIT_EXHAUSTED: i32 = 2;

/// Everything needed to launch one worker process.
#[derive(Debug, Clone)]
pub struct AttemptSpec {
    /// 1-based attempt id.
    pub id: usize,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub log_path: PathBuf,
    pub timeout: Option<Duration>,
    /// Time between the forwarded signal and SIGKILL.
    pub grace_period: Duration,
}

impl AttemptSpec {
    pub fn new(id: usize, program: impl Into<PathBuf>, args: Vec<String>, log_path: PathBuf) -> Self {
        Self {
            id,
            program: program.into(),
            args,
            log_path,
            timeout: None,
            grace_period: Duration::from_millis(500),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

/// Terminal status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Completion marker observed.
    Succeeded,
    /// Worker finished cleanly without a solution.
    Exhausted,
    Failed { code: Option<i32> },
    TimedOut,
    Cancelled,
}

impl AttemptStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }

    /// Map a finished process to a status. The marker wins over the exit code.
    pub const fn from_exit(marker_found: bool, code: Option<i32>) -> Self {
        if marker_found {
            return Self::Succeeded;
        }
        match code {
            Some(0 | EXIT_EXHAUSTED) => Self::Exhausted,
            other => Self::Failed { code: other },
        }
    }
}

/// Immutable result of one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    pub id: usize,
    pub status: AttemptStatus,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl AttemptResult {
    pub fn new(id: usize, status: AttemptStatus, log_path: PathBuf) -> Self {
        Self {
            id,
            status,
            exit_code: None,
            success: status == AttemptStatus::Succeeded,
            stdout: String::new(),
            stderr: String::new(),
            log_path,
            elapsed: Duration::ZERO,
        }
    }

    /// Result for an attempt that was never started.
    pub fn cancelled_before_start(id: usize, log_path: PathBuf) -> Self {
        Self::new(id, AttemptStatus::Cancelled, log_path)
    }
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
