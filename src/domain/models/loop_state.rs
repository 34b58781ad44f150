//! Convergence loop state.
//!
//! A `LoopState` is owned by exactly one running loop. All streak arithmetic
//! lives here so it can be exercised without an inference provider.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::ConvergenceConfig;
use super::conversation::Conversation;
use super::verification::VerificationOutcome;

/// Phase of the draft/verify/correct cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Drafting,
    SelfImproving,
    Verifying,
    Correcting,
    Succeeded,
    Abandoned,
}

impl Phase {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Abandoned)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Drafting => "drafting",
            Self::SelfImproving => "self_improving",
            Self::Verifying => "verifying",
            Self::Correcting => "correcting",
            Self::Succeeded => "succeeded",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    ErrorStreak,
    RoundLimit,
}

/// Terminal result of one loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoopOutcome {
    Succeeded { solution: String },
    Abandoned { reason: AbandonReason },
}

impl LoopOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Summary returned when a loop reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopReport {
    pub outcome: LoopOutcome,
    pub correct_streak: u32,
    pub error_streak: u32,
    pub rounds: u32,
}

/// Mutable state of one convergence loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    pub input: String,
    pub other_prompts: Vec<String>,
    pub phase: Phase,
    /// Current candidate solution.
    pub draft: Option<String>,
    /// Context for the self-improvement step.
    pub conversation: Conversation,
    pub last_verification: Option<VerificationOutcome>,
    pub correct_streak: u32,
    pub error_streak: u32,
    pub round: u32,
    pub abandon_reason: Option<AbandonReason>,
}

impl LoopState {
    pub fn new(input: impl Into<String>, other_prompts: Vec<String>) -> Self {
        Self {
            input: input.into(),
            other_prompts,
            phase: Phase::Drafting,
            draft: None,
            conversation: Conversation::new(),
            last_verification: None,
            correct_streak: 0,
            error_streak: 0,
            round: 0,
            abandon_reason: None,
        }
    }

    /// Apply a verification verdict: accept re-verifies, reject corrects.
    pub fn record_verification(&mut self, outcome: VerificationOutcome) {
        if outcome.accepted {
            self.correct_streak += 1;
            self.error_streak = 0;
            self.phase = Phase::Verifying;
        } else {
            self.error_streak += 1;
            self.correct_streak = 0;
            self.phase = Phase::Correcting;
        }
        self.round += 1;
        self.last_verification = Some(outcome);
    }

    /// A generation step produced no extractable draft. The phase is kept so
    /// it is retried.
    pub fn record_failed_round(&mut self) {
        self.error_streak += 1;
        self.correct_streak = 0;
        self.round += 1;
    }

    /// A transport or protocol failure; streaks are left untouched.
    pub fn record_interrupted_round(&mut self) {
        self.round += 1;
    }

    /// Move to the next phase after a successful generation step.
    pub fn advance(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Check the thresholds and, if one fired, move to the terminal phase.
    pub fn check_terminal(&mut self, limits: &ConvergenceConfig) -> bool {
        if self.phase.is_terminal() {
            return true;
        }
        if self.correct_streak >= limits.accept_streak {
            self.phase = Phase::Succeeded;
        } else if self.error_streak >= limits.failure_streak {
            self.phase = Phase::Abandoned;
            self.abandon_reason = Some(AbandonReason::ErrorStreak);
        } else if self.round >= limits.max_rounds {
            self.phase = Phase::Abandoned;
            self.abandon_reason = Some(AbandonReason::RoundLimit);
        }
        self.phase.is_terminal()
    }

    /// Build the report for a terminal state.
    pub fn report(&self) -> Option<LoopReport> {
        let outcome = match self.phase {
            Phase::Succeeded => LoopOutcome::Succeeded {
                solution: self.draft.clone().unwrap_or_default(),
            },
            Phase::Abandoned => LoopOutcome::Abandoned {
                reason: self.abandon_reason.unwrap_or(AbandonReason::RoundLimit),
            },
            _ => return None,
        };
        Some(LoopReport {
            outcome,
            correct_streak: self.correct_streak,
            error_streak: self.error_streak,
            rounds: self.round,
        })
    }
}
