//! Port trait definitions (Hexagonal Architecture)
//!
//! - InferenceClient: send a conversation to the reasoning service
//! - CheckpointStore: persist and restore loop snapshots
//! - Transcript: per-attempt log sink

pub mod checkpoint_store;
pub mod inference;
pub mod transcript;

pub use checkpoint_store::CheckpointStore;
pub use inference::InferenceClient;
pub use transcript::Transcript;
