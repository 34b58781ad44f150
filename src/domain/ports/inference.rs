//! Inference port - interface for the remote reasoning service.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Conversation, EffortLevel, NormalizedResponse};

/// Sends a conversation and returns the normalized reply.
///
/// Implementations fail with `DomainError::Transport` on network or HTTP
/// failure and `DomainError::Protocol` on an unparsable response. They never
/// retry; the convergence loop owns retry policy.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn send(
        &self,
        conversation: &Conversation,
        effort: EffortLevel,
    ) -> DomainResult<NormalizedResponse>;
}
