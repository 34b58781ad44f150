//! Adapters implementing the domain ports against external systems.

pub mod benchmark;
pub mod checkpoint;
pub mod inference;
pub mod transcript;

pub use benchmark::BenchmarkSource;
pub use checkpoint::{FileCheckpointStore, InMemoryCheckpointStore};
pub use inference::{MockInferenceClient, MockReply, OpenAiCompatClient};
pub use transcript::{FileTranscript, MemoryTranscript, NullTranscript};
