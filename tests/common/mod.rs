//! Common test utilities for integration tests
//!
//! Provides an inference double that answers each stage of the convergence
//! loop by its system prompt, plus a few shared fixtures.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proofloop::adapters::inference::mock::{MockInferenceClient, MockReply};
use proofloop::domain::models::{AttemptSpec, Conversation, EffortLevel};
use proofloop::services::PromptSet;
use tempfile::TempDir;

pub const DRAFT: &str =
    "Let me think.\n\n### Summary ###\nThe claim holds.\n### Detailed Solution ###\nBy induction on n.";

pub const VERIFIER_REPORT: &str = "### Summary ###\nStep 2 divides by zero.\n### Detailed Verification Log ###\nStep 1 is fine.";

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Which loop stage a request belongs to, judged by its system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generation,
    Verification,
    Classification,
}

pub fn stage_of(conversation: &Conversation) -> Stage {
    let prompts = PromptSet::default();
    let system = conversation
        .messages()
        .first()
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    if system.is_empty() {
        Stage::Classification
    } else if system == prompts.verification_system {
        Stage::Verification
    } else {
        Stage::Generation
    }
}

/// Client that always drafts [`DRAFT`], verifies with [`VERIFIER_REPORT`]
/// and answers classification questions from `verdicts` in order.
///
/// The first `transport_failures` requests fail with a transport error.
pub fn routed_client(
    verdicts: impl IntoIterator<Item = bool>,
    transport_failures: usize,
) -> Arc<MockInferenceClient> {
    let verdicts = Mutex::new(verdicts.into_iter().collect::<VecDeque<_>>());
    let calls = AtomicUsize::new(0);

    Arc::new(MockInferenceClient::with_responder(
        move |conversation: &Conversation, _effort: EffortLevel| {
            if calls.fetch_add(1, Ordering::SeqCst) < transport_failures {
                return MockReply::transport("connection refused");
            }
            match stage_of(conversation) {
                Stage::Generation => MockReply::text(DRAFT),
                Stage::Verification => MockReply::text(VERIFIER_REPORT),
                Stage::Classification => match verdicts.lock().unwrap().pop_front() {
                    Some(true) => MockReply::text("yes"),
                    Some(false) => MockReply::text("no"),
                    None => MockReply::protocol("no verdict scripted"),
                },
            }
        },
    ))
}

/// `sh -c script` as attempt `id`, logging into `dir`.
pub fn sh_attempt(id: usize, script: &str, dir: &Path) -> AttemptSpec {
    AttemptSpec::new(
        id,
        "sh",
        vec!["-c".to_string(), script.to_string()],
        dir.join(format!("attempt_{id:02}.log")),
    )
}
