//! proofloop - generate, self-improve, verify and correct proofs
//!
//! Drives a reasoning service through a convergence loop until a verifier
//! accepts the same solution several rounds in a row, and fans that loop out
//! over many supervised worker processes.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Adapters** (`adapters`): inference client, checkpoint stores,
//!   transcripts, benchmark CSV
//! - **Service Layer** (`services`): normalizer, extraction, adjudicator,
//!   convergence loop, attempt supervisor, fleet coordinator
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging,
//!   process groups and signals
//! - **CLI Layer** (`cli`): `solve`, `fleet`, `benchmark`

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    AttemptResult, AttemptSpec, AttemptStatus, Config, FleetPolicy, FleetReport, LoopOutcome,
    LoopReport,
};
pub use domain::ports::{CheckpointStore, InferenceClient, Transcript};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AttemptSupervisor, ConvergenceLoop, FleetCoordinator};
