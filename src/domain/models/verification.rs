//! Verification outcome produced once per round.

use serde::{Deserialize, Serialize};

/// Binary verdict derived from a verifier's free-form judgement.
///
/// Superseded by the next round's outcome; never merged into history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub accepted: bool,
    /// The verifier's full judgement text.
    pub rationale: String,
    /// Text preceding the detailed verification section, present on reject.
    pub bug_report: Option<String>,
    /// Raw yes/no answer returned by the classification request.
    pub classifier_answer: String,
}

impl VerificationOutcome {
    pub fn accepted(rationale: impl Into<String>, classifier_answer: impl Into<String>) -> Self {
        Self {
            accepted: true,
            rationale: rationale.into(),
            bug_report: None,
            classifier_answer: classifier_answer.into(),
        }
    }

    pub fn rejected(
        rationale: impl Into<String>,
        bug_report: impl Into<String>,
        classifier_answer: impl Into<String>,
    ) -> Self {
        Self {
            accepted: false,
            rationale: rationale.into(),
            bug_report: Some(bug_report.into()),
            classifier_answer: classifier_answer.into(),
        }
    }

    /// True when the verifier rejected without the expected report structure.
    pub fn has_unknown_reason(&self) -> bool {
        !self.accepted
            && self
                .bug_report
                .as_deref()
                .is_none_or(|report| report.trim().is_empty())
    }

    /// Feedback handed to the correction step. Falls back to the whole
    /// rationale when the bug report is empty.
    pub fn correction_feedback(&self) -> &str {
        if self.has_unknown_reason() {
            &self.rationale
        } else {
            self.bug_report.as_deref().unwrap_or_default()
        }
    }
}
