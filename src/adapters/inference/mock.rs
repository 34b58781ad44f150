//! Scripted inference client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Conversation, EffortLevel, FinishReason, NormalizedResponse};
use crate::domain::ports::InferenceClient;
use crate::services::normalizer;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(NormalizedResponse),
    Transport(String),
    Protocol(String),
}

impl MockReply {
    /// A reply whose raw text goes through the normalizer like a real one.
    pub fn text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalizer::normalize(&raw);
        Self::Response(NormalizedResponse {
            content: normalized.content,
            trace: normalized.trace,
            raw,
            finish: FinishReason::Stop,
        })
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    fn into_result(self) -> DomainResult<NormalizedResponse> {
        match self {
            Self::Response(response) => Ok(response),
            Self::Transport(message) => Err(DomainError::Transport(message)),
            Self::Protocol(message) => Err(DomainError::Protocol(message)),
        }
    }
}

type Responder = dyn Fn(&Conversation, EffortLevel) -> MockReply + Send + Sync;

enum Source {
    Script(Mutex<VecDeque<MockReply>>),
    Responder(Box<Responder>),
}

/// Inference client that replays a script, or answers through a closure,
/// and records every request it receives.
pub struct MockInferenceClient {
    source: Source,
    requests: Mutex<Vec<(Conversation, EffortLevel)>>,
}

impl MockInferenceClient {
    /// Replies are returned in order; an exhausted script is a protocol error.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            source: Source::Script(Mutex::new(replies.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Compute each reply from the request.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Conversation, EffortLevel) -> MockReply + Send + Sync + 'static,
    {
        Self {
            source: Source::Responder(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<(Conversation, EffortLevel)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn send(
        &self,
        conversation: &Conversation,
        effort: EffortLevel,
    ) -> DomainResult<NormalizedResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((conversation.clone(), effort));

        let reply = match &self.source {
            Source::Script(queue) => queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| MockReply::protocol("mock script exhausted")),
            Source::Responder(responder) => responder(conversation, effort),
        };
        reply.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_and_exhaustion() {
        let client = MockInferenceClient::new(vec![MockReply::text("one"), MockReply::transport("down")]);
        let conv = Conversation::opening("s", "q", &[]);

        assert_eq!(client.send(&conv, EffortLevel::High).await.unwrap().content, "one");
        assert!(matches!(
            client.send(&conv, EffortLevel::High).await,
            Err(DomainError::Transport(_))
        ));
        assert!(matches!(
            client.send(&conv, EffortLevel::High).await,
            Err(DomainError::Protocol(_))
        ));
        assert_eq!(client.request_count(), 3);
    }

    #[tokio::test]
    async fn test_text_reply_is_normalized() {
        let client = MockInferenceClient::new(vec![MockReply::text(
            "<|channel|>analysis<|message|>hmm<|end|><|channel|>final<|message|>yes",
        )]);
        let response = client
            .send(&Conversation::new(), EffortLevel::Low)
            .await
            .unwrap();
        assert_eq!(response.content, "yes");
        assert_eq!(response.trace.as_deref(), Some("hmm"));
    }

    #[tokio::test]
    async fn test_responder_sees_request() {
        let client = MockInferenceClient::with_responder(|conv, effort| {
            MockReply::text(format!("{} messages at {effort}", conv.len()))
        });
        let conv = Conversation::opening("s", "q", &["extra".to_string()]);
        let response = client.send(&conv, EffortLevel::Medium).await.unwrap();
        assert_eq!(response.content, "3 messages at medium");
    }
}
