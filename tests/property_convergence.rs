//! Property tests for the convergence state machine and the text pipeline.

use proptest::prelude::*;

use proofloop::domain::models::{
    AbandonReason, ConvergenceConfig, LoopOutcome, LoopState, Phase, VerificationOutcome,
};
use proofloop::services::{extraction, normalizer};

fn verdict(accepted: bool) -> VerificationOutcome {
    if accepted {
        VerificationOutcome::accepted("looks right", "yes")
    } else {
        VerificationOutcome::rejected("wrong", "### Summary ### gap", "no")
    }
}

/// Feed verdicts until the state machine stops. Returns the final state.
fn drive(verdicts: &[bool], limits: &ConvergenceConfig) -> LoopState {
    let mut state = LoopState::new("problem", vec![]);
    state.draft = Some("### Summary ### draft".to_string());
    state.phase = Phase::Verifying;
    for &accepted in verdicts {
        if state.check_terminal(limits) {
            break;
        }
        state.record_verification(verdict(accepted));
        assert!(
            state.correct_streak == 0 || state.error_streak == 0,
            "both streaks positive after round {}",
            state.round
        );
    }
    state.check_terminal(limits);
    state
}

/// Straight-line reference: success iff `accept` consecutive yeses occur
/// before `reject` consecutive noes and within `max_rounds` verdicts.
fn expected(verdicts: &[bool], limits: &ConvergenceConfig) -> Option<LoopOutcome> {
    let (mut yes, mut no) = (0, 0);
    for (i, &accepted) in verdicts.iter().enumerate() {
        if accepted {
            yes += 1;
            no = 0;
        } else {
            no += 1;
            yes = 0;
        }
        let rounds = u32::try_from(i + 1).unwrap();
        if yes >= limits.accept_streak {
            return Some(LoopOutcome::Succeeded {
                solution: "### Summary ### draft".to_string(),
            });
        }
        if no >= limits.failure_streak {
            return Some(LoopOutcome::Abandoned {
                reason: AbandonReason::ErrorStreak,
            });
        }
        if rounds >= limits.max_rounds {
            return Some(LoopOutcome::Abandoned {
                reason: AbandonReason::RoundLimit,
            });
        }
    }
    None
}

proptest! {
    #[test]
    fn prop_outcome_matches_reference(verdicts in prop::collection::vec(any::<bool>(), 0..60)) {
        let limits = ConvergenceConfig::default();
        let state = drive(&verdicts, &limits);
        let outcome = state.report().map(|r| r.outcome);
        prop_assert_eq!(outcome, expected(&verdicts, &limits));
        prop_assert!(state.round <= limits.max_rounds);
    }

    #[test]
    fn prop_small_thresholds(
        verdicts in prop::collection::vec(any::<bool>(), 0..40),
        accept in 1u32..4,
        failure in 1u32..4,
        max_rounds in 1u32..12,
    ) {
        let limits = ConvergenceConfig {
            accept_streak: accept,
            failure_streak: failure,
            max_rounds,
            ..Default::default()
        };
        let state = drive(&verdicts, &limits);
        prop_assert_eq!(state.report().map(|r| r.outcome), expected(&verdicts, &limits));
    }

    #[test]
    fn prop_summary_extraction_is_idempotent(text in ".{0,200}", with_marker in any::<bool>()) {
        let text = if with_marker { format!("{text}\n### Summary ###\n{text}") } else { text };
        if let Some(once) = extraction::extract_summary(&text) {
            prop_assert_eq!(extraction::extract_summary(&once), Some(once.clone()));
        }
    }

    #[test]
    fn prop_normalization_is_idempotent(
        parts in prop::collection::vec(
            prop_oneof![
                Just("<|channel|>analysis<|message|>".to_string()),
                Just("<|channel|>final<|message|>".to_string()),
                Just("<|end|>".to_string()),
                Just("<|start|>assistant".to_string()),
                "[a-z |<>#]{0,12}",
            ],
            0..8,
        )
    ) {
        let raw = parts.concat();
        let once = normalizer::normalize_content(&raw);
        prop_assert_eq!(normalizer::normalize_content(&once), once.clone());
        prop_assert!(!normalizer::has_markers(&once));
    }
}
