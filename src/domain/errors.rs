//! Domain errors for the proofloop system.

use thiserror::Error;

/// Domain-level errors that can occur in proofloop.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Network or HTTP failure talking to the inference service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The inference service answered with something we cannot parse.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The response did not contain the summary marker.
    #[error("No draft found in response")]
    NoDraftFound,

    #[error("Attempt timed out after {seconds}s")]
    TimeoutExceeded { seconds: u64 },

    #[error("Process exited with code {code:?} without producing a solution")]
    ProcessFailure { code: Option<i32> },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Benchmark error: {0}")]
    Benchmark(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    /// Returns true for errors the convergence loop absorbs by restarting the
    /// current round.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Protocol(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for DomainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
