//! Convergence loop service.
//!
//! Drives one run of draft, self-improvement, verification and correction
//! against the inference service until the acceptance streak or a failure
//! limit fires. The loop is sequential; its only suspension points are
//! inference requests. State is checkpointed after every transition so an
//! interrupted run resumes where it stopped.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::adapters::transcript::NullTranscript;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ChatMessage, Checkpoint, ConvergenceConfig, Conversation, EffortConfig, LoopOutcome,
    LoopReport, LoopState, Phase,
};
use crate::domain::ports::{CheckpointStore, InferenceClient, Transcript};
use crate::services::adjudicator::VerificationAdjudicator;
use crate::services::extraction;
use crate::services::prompts::PromptSet;

/// One convergence loop instance. Owns no state between runs; each
/// [`ConvergenceLoop::run`] builds or restores its own [`LoopState`].
pub struct ConvergenceLoop {
    client: Arc<dyn InferenceClient>,
    adjudicator: VerificationAdjudicator,
    prompts: Arc<PromptSet>,
    limits: ConvergenceConfig,
    effort: EffortConfig,
    checkpoints: Option<(Arc<dyn CheckpointStore>, String)>,
    transcript: Arc<dyn Transcript>,
}

impl ConvergenceLoop {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        prompts: Arc<PromptSet>,
        limits: ConvergenceConfig,
        effort: EffortConfig,
    ) -> Self {
        let adjudicator =
            VerificationAdjudicator::new(Arc::clone(&client), Arc::clone(&prompts), effort.classification);
        Self {
            client,
            adjudicator,
            prompts,
            limits,
            effort,
            checkpoints: None,
            transcript: Arc::new(NullTranscript),
        }
    }

    /// Persist state under `key` after every transition, and resume from it.
    #[must_use]
    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>, key: impl Into<String>) -> Self {
        self.checkpoints = Some((store, key.into()));
        self
    }

    #[must_use]
    pub fn with_transcript(mut self, transcript: Arc<dyn Transcript>) -> Self {
        self.transcript = transcript;
        self
    }

    /// Run until success or abandonment.
    ///
    /// Round-local failures (missing draft, transport and protocol errors)
    /// are absorbed into the counters. Only checkpoint and other ambient
    /// failures are returned as errors.
    #[instrument(skip_all, fields(input_chars = input.len(), other_prompts = other_prompts.len()))]
    pub async fn run(&self, input: &str, other_prompts: &[String]) -> DomainResult<LoopReport> {
        let mut state = self.restore(input, other_prompts).await?;

        loop {
            if state.check_terminal(&self.limits) {
                return self.finish(&state).await;
            }

            let phase = state.phase;
            match self.step(&mut state).await {
                Ok(()) => {}
                Err(DomainError::NoDraftFound) => {
                    state.record_failed_round();
                    warn!(
                        phase = %phase,
                        round = state.round,
                        error_streak = state.error_streak,
                        "no draft found in response"
                    );
                    self.transcript
                        .record("No draft", &format!("{phase} produced no summary section"));
                }
                Err(err) if err.is_transient() => {
                    state.record_interrupted_round();
                    warn!(phase = %phase, round = state.round, error = %err, "inference failed, restarting round");
                    self.transcript.record("Inference error", &err.to_string());
                }
                Err(err) => return Err(err),
            }

            self.save(&state).await?;
        }
    }

    async fn step(&self, state: &mut LoopState) -> DomainResult<()> {
        match state.phase {
            Phase::Drafting => self.draft(state).await,
            Phase::SelfImproving => self.self_improve(state).await,
            Phase::Verifying => self.verify(state).await,
            Phase::Correcting => self.correct(state).await,
            Phase::Succeeded | Phase::Abandoned => Ok(()),
        }
    }

    async fn draft(&self, state: &mut LoopState) -> DomainResult<()> {
        let mut conversation = self.opening(state);
        self.transcript.record("Problem", &state.input);

        let response = self.client.send(&conversation, self.effort.generation).await?;
        let text = response.full_text();
        self.transcript.record("Initial response", &text);
        let draft = extraction::extract_draft(&text)?;

        conversation.push(response.to_assistant_message());
        state.conversation = conversation;
        state.draft = Some(draft);
        state.advance(Phase::SelfImproving);
        debug!("initial draft extracted");
        Ok(())
    }

    async fn self_improve(&self, state: &mut LoopState) -> DomainResult<()> {
        let mut conversation = if state.conversation.is_empty() {
            let mut rebuilt = self.opening(state);
            if let Some(draft) = &state.draft {
                rebuilt.push(ChatMessage::assistant(draft.clone()));
            }
            rebuilt
        } else {
            state.conversation.clone()
        };
        conversation.push(ChatMessage::user(self.prompts.self_improvement.clone()));

        let response = self
            .client
            .send(&conversation, self.effort.self_improvement)
            .await?;
        let text = response.full_text();
        self.transcript.record("Improved solution", &text);
        let draft = extraction::extract_draft(&text)?;

        state.draft = Some(draft);
        state.conversation = Conversation::new();
        state.advance(Phase::Verifying);
        debug!("self-improved draft extracted");
        Ok(())
    }

    async fn verify(&self, state: &mut LoopState) -> DomainResult<()> {
        let Some(draft) = state.draft.as_deref() else {
            warn!("verification requested without a draft, drafting again");
            state.advance(Phase::Drafting);
            return Ok(());
        };

        let detailed = extraction::detailed_solution(draft);
        let request = self.prompts.verification_request(&state.input, &detailed);
        let conversation = Conversation::opening(&self.prompts.verification_system, &request, &[]);

        let response = self.client.send(&conversation, self.effort.verification).await?;
        self.transcript.record("Verification", &response.content);

        let outcome = self.adjudicator.adjudicate(&response.content).await?;
        if outcome.accepted {
            self.transcript.record("Verdict", "accepted");
        } else {
            if outcome.has_unknown_reason() {
                warn!("unknown reason for rejection, using the full verifier judgement as feedback");
            }
            self.transcript
                .record("Bug report", outcome.correction_feedback());
        }

        state.record_verification(outcome);
        info!(
            round = state.round,
            correct_streak = state.correct_streak,
            error_streak = state.error_streak,
            accepted = state.correct_streak > 0,
            "verification round complete"
        );
        Ok(())
    }

    async fn correct(&self, state: &mut LoopState) -> DomainResult<()> {
        let feedback = state
            .last_verification
            .as_ref()
            .map(|outcome| outcome.correction_feedback().to_string())
            .unwrap_or_default();

        let mut conversation = self.opening(state);
        if let Some(draft) = &state.draft {
            conversation.push(ChatMessage::assistant(draft.clone()));
        }
        conversation.push(ChatMessage::user(self.prompts.correction_request(&feedback)));

        let response = self.client.send(&conversation, self.effort.generation).await?;
        let text = response.full_text();
        self.transcript.record("Corrected solution", &text);
        let draft = extraction::extract_draft(&text)?;

        state.draft = Some(draft);
        state.advance(Phase::Verifying);
        debug!("corrected draft extracted");
        Ok(())
    }

    fn opening(&self, state: &LoopState) -> Conversation {
        Conversation::opening(&self.prompts.generation, &state.input, &state.other_prompts)
    }

    async fn restore(&self, input: &str, other_prompts: &[String]) -> DomainResult<LoopState> {
        let fresh = || LoopState::new(input, other_prompts.to_vec());
        let Some((store, key)) = &self.checkpoints else {
            return Ok(fresh());
        };

        match store.load(key).await? {
            Some(checkpoint) if !checkpoint.belongs_to(input, other_prompts) => {
                warn!(key = %key, "checkpoint belongs to a different problem, starting fresh");
                Ok(fresh())
            }
            Some(checkpoint) if checkpoint.is_terminal() => {
                info!(key = %key, phase = %checkpoint.phase, "clearing finished checkpoint");
                store.clear(key).await?;
                Ok(fresh())
            }
            Some(checkpoint) => {
                if checkpoint.effort != self.effort {
                    debug!(key = %key, "checkpoint effort differs from configuration, using configuration");
                }
                info!(
                    key = %key,
                    phase = %checkpoint.phase,
                    round = checkpoint.round,
                    correct_streak = checkpoint.correct_streak,
                    error_streak = checkpoint.error_streak,
                    "resuming from checkpoint"
                );
                Ok(checkpoint.into_state())
            }
            None => Ok(fresh()),
        }
    }

    async fn save(&self, state: &LoopState) -> DomainResult<()> {
        if let Some((store, key)) = &self.checkpoints {
            let checkpoint = Checkpoint::capture(state, self.limits.max_rounds, self.effort);
            store.save(key, &checkpoint).await?;
        }
        Ok(())
    }

    async fn finish(&self, state: &LoopState) -> DomainResult<LoopReport> {
        self.save(state).await?;
        let report = state.report().ok_or_else(|| {
            DomainError::Validation(format!("phase {} has no outcome", state.phase))
        })?;

        match &report.outcome {
            LoopOutcome::Succeeded { solution } => {
                info!(rounds = report.rounds, "solution accepted");
                self.transcript.record("Accepted solution", solution);
            }
            LoopOutcome::Abandoned { reason } => {
                info!(rounds = report.rounds, reason = ?reason, "loop abandoned");
                self.transcript
                    .record("Abandoned", &format!("{reason:?} after {} rounds", report.rounds));
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::checkpoint::InMemoryCheckpointStore;
    use crate::adapters::inference::mock::{MockInferenceClient, MockReply};
    use crate::adapters::transcript::MemoryTranscript;
    use crate::domain::models::{AbandonReason, EffortLevel, Role};

    const DRAFT: &str = "### Summary ###\nclaim\n### Detailed Solution ###\nproof";

    #[tokio::test]
    async fn test_missing_draft_consumes_round_and_retries_phase() {
        let client = Arc::new(MockInferenceClient::new(vec![
            MockReply::text("I could not finish."),
            MockReply::text(DRAFT),
            MockReply::text(DRAFT),
            MockReply::text("verifier ok"),
            MockReply::text("yes"),
        ]));
        let limits = ConvergenceConfig {
            accept_streak: 1,
            ..Default::default()
        };
        let engine = ConvergenceLoop::new(
            client.clone(),
            Arc::new(PromptSet::default()),
            limits,
            EffortConfig::default(),
        );

        let report = engine.run("Prove it.", &[]).await.unwrap();
        assert!(report.outcome.is_success());
        assert_eq!(report.rounds, 2);
        assert_eq!(report.error_streak, 0);
        assert_eq!(client.request_count(), 5);
    }

    #[tokio::test]
    async fn test_stage_efforts_and_conversations() {
        let client = Arc::new(MockInferenceClient::new(vec![
            MockReply::text(DRAFT),
            MockReply::text(DRAFT),
            MockReply::text("verifier ok"),
            MockReply::text("yes"),
        ]));
        let limits = ConvergenceConfig {
            accept_streak: 1,
            ..Default::default()
        };
        let effort = EffortConfig {
            generation: EffortLevel::High,
            self_improvement: EffortLevel::Medium,
            verification: EffortLevel::High,
            classification: EffortLevel::Low,
        };
        let engine = ConvergenceLoop::new(client.clone(), Arc::new(PromptSet::default()), limits, effort);
        engine.run("Prove it.", &["hint".to_string()]).await.unwrap();

        let requests = client.requests();
        let efforts: Vec<_> = requests.iter().map(|(_, e)| *e).collect();
        assert_eq!(
            efforts,
            vec![EffortLevel::High, EffortLevel::Medium, EffortLevel::High, EffortLevel::Low]
        );

        let self_improve = &requests[1].0;
        assert_eq!(self_improve.len(), 5);
        assert_eq!(self_improve.messages()[3].role, Role::Assistant);
        assert_eq!(self_improve.last().unwrap().role, Role::User);

        let verify = &requests[2].0;
        assert!(verify.messages()[1].content.contains("### Problem ###"));
        assert!(verify.messages()[1].content.contains("proof"));
        assert!(!verify.messages()[1].content.contains("claim"));
    }

    #[tokio::test]
    async fn test_transport_errors_consume_rounds_without_streaks() {
        let client = Arc::new(MockInferenceClient::new(
            (0..3).map(|_| MockReply::transport("connection refused")).collect(),
        ));
        let limits = ConvergenceConfig {
            max_rounds: 3,
            ..Default::default()
        };
        let engine = ConvergenceLoop::new(
            client,
            Arc::new(PromptSet::default()),
            limits,
            EffortConfig::default(),
        );
        let report = engine.run("Prove it.", &[]).await.unwrap();
        assert_eq!(
            report.outcome,
            LoopOutcome::Abandoned {
                reason: AbandonReason::RoundLimit
            }
        );
        assert_eq!(report.rounds, 3);
        assert_eq!(report.error_streak, 0);
    }

    #[tokio::test]
    async fn test_terminal_checkpoint_is_cleared_and_run_restarts() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut finished = LoopState::new("Prove it.", vec![]);
        finished.phase = Phase::Abandoned;
        finished.round = 30;
        store
            .save("k", &Checkpoint::capture(&finished, 30, EffortConfig::default()))
            .await
            .unwrap();

        let client = Arc::new(MockInferenceClient::new(vec![MockReply::text("nothing")]));
        let limits = ConvergenceConfig {
            max_rounds: 1,
            ..Default::default()
        };
        let report = ConvergenceLoop::new(
            client.clone(),
            Arc::new(PromptSet::default()),
            limits,
            EffortConfig::default(),
        )
        .with_checkpoints(store.clone(), "k")
        .run("Prove it.", &[])
        .await
        .unwrap();

        assert_eq!(client.request_count(), 1);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.error_streak, 1);
    }

    #[tokio::test]
    async fn test_transcript_records_bug_report() {
        let client = Arc::new(MockInferenceClient::new(vec![
            MockReply::text(DRAFT),
            MockReply::text(DRAFT),
            MockReply::text("### Summary ###\nGap in step 1.\n### Detailed Verification Log ###\n..."),
            MockReply::text("no"),
        ]));
        let limits = ConvergenceConfig {
            max_rounds: 1,
            ..Default::default()
        };
        let transcript = Arc::new(MemoryTranscript::new());
        ConvergenceLoop::new(client, Arc::new(PromptSet::default()), limits, EffortConfig::default())
            .with_transcript(transcript.clone())
            .run("Prove it.", &[])
            .await
            .unwrap();

        let reports = transcript.section("Bug report");
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("Gap in step 1."));
        assert_eq!(transcript.section("Abandoned").len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_provider_hits_round_limit() {
        let client = Arc::new(MockInferenceClient::new(vec![]));
        let limits = ConvergenceConfig {
            max_rounds: 2,
            ..Default::default()
        };
        let report = ConvergenceLoop::new(client, Arc::new(PromptSet::default()), limits, EffortConfig::default())
            .run("p", &[])
            .await
            .unwrap();
        assert_eq!(report.rounds, 2);
        assert_eq!(report.correct_streak, 0);
    }
}
