//! Persisted loop snapshot used to resume after a process restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::EffortConfig;
use super::conversation::Conversation;
use super::loop_state::{AbandonReason, LoopState, Phase};
use super::verification::VerificationOutcome;

/// Snapshot written after every phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub input: String,
    #[serde(default)]
    pub other_prompts: Vec<String>,
    pub round: u32,
    pub max_rounds: u32,
    pub phase: Phase,
    pub draft: Option<String>,
    #[serde(default)]
    pub conversation: Conversation,
    pub last_verification: Option<VerificationOutcome>,
    pub correct_streak: u32,
    pub error_streak: u32,
    #[serde(default)]
    pub abandon_reason: Option<AbandonReason>,
    pub effort: EffortConfig,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn capture(state: &LoopState, max_rounds: u32, effort: EffortConfig) -> Self {
        Self {
            input: state.input.clone(),
            other_prompts: state.other_prompts.clone(),
            round: state.round,
            max_rounds,
            phase: state.phase,
            draft: state.draft.clone(),
            conversation: state.conversation.clone(),
            last_verification: state.last_verification.clone(),
            correct_streak: state.correct_streak,
            error_streak: state.error_streak,
            abandon_reason: state.abandon_reason,
            effort,
            saved_at: Utc::now(),
        }
    }

    /// True when this snapshot was taken for the same input.
    pub fn belongs_to(&self, input: &str, other_prompts: &[String]) -> bool {
        self.input == input && self.other_prompts == other_prompts
    }

    pub const fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn into_state(self) -> LoopState {
        LoopState {
            input: self.input,
            other_prompts: self.other_prompts,
            phase: self.phase,
            draft: self.draft,
            conversation: self.conversation,
            last_verification: self.last_verification,
            correct_streak: self.correct_streak,
            error_streak: self.error_streak,
            round: self.round,
            abandon_reason: self.abandon_reason,
        }
    }
}
