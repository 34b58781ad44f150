//! Verification adjudicator.
//!
//! Verifier prose is too varied for pattern matching, so the verdict is
//! obtained by asking the inference service a constrained yes/no question
//! about it. Only the bug report is extracted locally, by marker.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{Conversation, EffortLevel, VerificationOutcome};
use crate::domain::ports::InferenceClient;
use crate::services::extraction;
use crate::services::prompts::PromptSet;

pub struct VerificationAdjudicator {
    client: Arc<dyn InferenceClient>,
    prompts: Arc<PromptSet>,
    effort: EffortLevel,
}

impl VerificationAdjudicator {
    pub fn new(client: Arc<dyn InferenceClient>, prompts: Arc<PromptSet>, effort: EffortLevel) -> Self {
        Self {
            client,
            prompts,
            effort,
        }
    }

    /// Classify a verifier's judgement.
    ///
    /// Accepted iff the answer contains `yes`, case-insensitively. On reject
    /// the bug report may be empty; callers treat that as an unknown reason.
    #[instrument(skip_all, fields(verifier_chars = verifier_text.len()))]
    pub async fn adjudicate(&self, verifier_text: &str) -> DomainResult<VerificationOutcome> {
        let question = self.prompts.classification_request(verifier_text);
        let conversation = Conversation::opening("", &question, &[]);
        let response = self.client.send(&conversation, self.effort).await?;
        let answer = response.content;

        if is_affirmative(&answer) {
            debug!(answer = %answer, "verification accepted");
            return Ok(VerificationOutcome::accepted(verifier_text, answer));
        }

        let report = extraction::bug_report(verifier_text);
        debug!(answer = %answer, bug_report_chars = report.len(), "verification rejected");
        Ok(VerificationOutcome::rejected(verifier_text, report, answer))
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.to_lowercase().contains("yes")
}
