pub mod attempt;
pub mod benchmark;
pub mod checkpoint;
pub mod config;
pub mod conversation;
pub mod fleet;
pub mod loop_state;
pub mod verification;

pub use attempt::{AttemptResult, AttemptSpec, AttemptStatus, COMPLETION_MARKER, EXIT_EXHAUSTED};
pub use benchmark::BenchmarkProblem;
pub use checkpoint::Checkpoint;
pub use config::{
    CheckpointConfig, Config, ConvergenceConfig, EffortConfig, FleetConfig, InferenceConfig,
    LoggingConfig, StreamGuardConfig,
};
pub use conversation::{
    ChatMessage, Conversation, EffortLevel, FinishReason, NormalizedResponse, Role,
};
pub use fleet::{FleetPolicy, FleetReport, InputAssignment};
pub use loop_state::{AbandonReason, LoopOutcome, LoopReport, LoopState, Phase};
pub use verification::VerificationOutcome;
