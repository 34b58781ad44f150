//! Inference client adapters.

pub mod mock;
pub mod openai_compat;
pub mod streaming;

pub use mock::{MockInferenceClient, MockReply};
pub use openai_compat::OpenAiCompatClient;
pub use streaming::{StreamGuard, StreamedReply};
