use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::conversation::EffortLevel;

/// Main configuration structure for proofloop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Inference endpoint configuration
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Effort tier per loop stage
    #[serde(default)]
    pub effort: EffortConfig,

    /// Streak thresholds and round limits
    #[serde(default)]
    pub convergence: ConvergenceConfig,

    /// Degenerate stream protection
    #[serde(default)]
    pub stream_guard: StreamGuardConfig,

    /// Parallel attempt settings
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Checkpoint persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Inference endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InferenceConfig {
    /// Full chat completions URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token; local deployments need none
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,

    /// Use incremental (SSE) delivery
    #[serde(default)]
    pub stream: bool,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8000/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "openai/gpt-oss-120b".to_string()
}

const fn default_temperature() -> f64 {
    0.1
}

const fn default_repetition_penalty() -> f64 {
    1.1
}

const fn default_request_timeout_secs() -> u64 {
    3600
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            repetition_penalty: default_repetition_penalty(),
            stream: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Effort tier used at each stage of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EffortConfig {
    #[serde(default)]
    pub generation: EffortLevel,
    #[serde(default)]
    pub self_improvement: EffortLevel,
    #[serde(default)]
    pub verification: EffortLevel,
    #[serde(default = "default_classification_effort")]
    pub classification: EffortLevel,
}

const fn default_classification_effort() -> EffortLevel {
    EffortLevel::Low
}

impl EffortConfig {
    /// Same tier for the three reasoning stages; classification stays low.
    pub const fn uniform(level: EffortLevel) -> Self {
        Self {
            generation: level,
            self_improvement: level,
            verification: level,
            classification: default_classification_effort(),
        }
    }
}

impl Default for EffortConfig {
    fn default() -> Self {
        Self::uniform(EffortLevel::High)
    }
}

/// Streak thresholds that decide when a loop terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConvergenceConfig {
    /// Consecutive accepted verifications required for success
    #[serde(default = "default_accept_streak")]
    pub accept_streak: u32,

    /// Consecutive failed rounds that abandon the loop
    #[serde(default = "default_failure_streak")]
    pub failure_streak: u32,

    /// Hard cap on round index
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Independent loops tried by one `solve` invocation
    #[serde(default = "default_max_runs")]
    pub max_runs: u32,
}

const fn default_accept_streak() -> u32 {
    5
}

const fn default_failure_streak() -> u32 {
    10
}

const fn default_max_rounds() -> u32 {
    30
}

const fn default_max_runs() -> u32 {
    10
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            accept_streak: default_accept_streak(),
            failure_streak: default_failure_streak(),
            max_rounds: default_max_rounds(),
            max_runs: default_max_runs(),
        }
    }
}

/// Limits applied while consuming a streamed response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamGuardConfig {
    /// Size of the trailing window compared for repetition, in chars
    #[serde(default = "default_repetition_window")]
    pub repetition_window: usize,

    /// Contiguous repeats of the trailing window that end delivery
    #[serde(default = "default_repetition_threshold")]
    pub repetition_threshold: usize,

    /// Hard cap on accumulated content, in chars
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

const fn default_repetition_window() -> usize {
    50
}

const fn default_repetition_threshold() -> usize {
    5
}

const fn default_max_content_chars() -> usize {
    50_000
}

impl Default for StreamGuardConfig {
    fn default() -> Self {
        Self {
            repetition_window: default_repetition_window(),
            repetition_threshold: default_repetition_threshold(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

/// Parallel attempt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FleetConfig {
    #[serde(default = "default_num_attempts")]
    pub num_attempts: usize,

    /// Concurrent workers; defaults to one per attempt
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Per-attempt timeout in seconds; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Time between the forwarded signal and SIGKILL
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Directory receiving `attempt_NN.log` files
    #[serde(default = "default_fleet_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default)]
    pub exit_on_first_success: bool,
}

const fn default_num_attempts() -> usize {
    10
}

const fn default_grace_period_ms() -> u64 {
    500
}

fn default_fleet_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            num_attempts: default_num_attempts(),
            max_workers: None,
            timeout_secs: None,
            grace_period_ms: default_grace_period_ms(),
            log_dir: default_fleet_log_dir(),
            exit_on_first_success: false,
        }
    }
}

impl FleetConfig {
    pub fn effective_max_workers(&self) -> usize {
        self.max_workers.unwrap_or(self.num_attempts).max(1)
    }
}

/// Checkpoint configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckpointConfig {
    /// Directory for checkpoint files; unset disables resumption
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling JSON log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
