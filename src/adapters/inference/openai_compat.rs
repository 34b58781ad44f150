//! OpenAI-compatible chat completions client.
//!
//! Talks to self-hosted reasoning servers (sglang, vLLM) exposing
//! `POST /v1/chat/completions`, with or without incremental delivery.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::streaming::{collect_sse, StreamedReply};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Conversation, EffortLevel, FinishReason, InferenceConfig, NormalizedResponse, StreamGuardConfig,
};
use crate::domain::ports::InferenceClient;
use crate::services::normalizer;

/// Request body.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub messages: Vec<WireMessage<'a>>,
    pub model: &'a str,
    pub temperature: f64,
    pub reasoning: Reasoning,
    pub repetition_penalty: f64,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct Reasoning {
    pub effort: EffortLevel,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// HTTP inference client.
pub struct OpenAiCompatClient {
    client: Client,
    config: InferenceConfig,
    guard: StreamGuardConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: InferenceConfig, guard: StreamGuardConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DomainError::Validation(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            guard,
        })
    }

    pub fn build_request<'a>(
        &'a self,
        conversation: &'a Conversation,
        effort: EffortLevel,
    ) -> ChatRequest<'a> {
        ChatRequest {
            messages: conversation
                .messages()
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                    thinking: m.thinking.as_deref(),
                })
                .collect(),
            model: &self.config.model,
            temperature: self.config.temperature,
            reasoning: Reasoning { effort },
            repetition_penalty: self.config.repetition_penalty,
            stream: self.config.stream,
        }
    }

    async fn read_complete(response: reqwest::Response) -> DomainResult<StreamedReply> {
        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::Protocol(format!("invalid response JSON: {e}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::Protocol("response has no choices".to_string()))?;

        let trace = choice
            .message
            .thinking
            .or(choice.message.reasoning_content)
            .filter(|t| !t.is_empty());
        Ok(StreamedReply {
            content: choice.message.content.unwrap_or_default(),
            trace,
            finish: FinishReason::from_wire(choice.finish_reason.as_deref()),
        })
    }
}

#[async_trait]
impl InferenceClient for OpenAiCompatClient {
    #[instrument(skip_all, fields(messages = conversation.len(), effort = %effort, stream = self.config.stream))]
    async fn send(
        &self,
        conversation: &Conversation,
        effort: EffortLevel,
    ) -> DomainResult<NormalizedResponse> {
        let body = self.build_request(conversation, effort);

        let mut request = self
            .client
            .post(&self.config.api_url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::Transport(format!("API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::Transport(format!("API error {status}: {body}")));
        }

        let reply = if self.config.stream {
            collect_sse(response.bytes_stream(), self.guard).await?
        } else {
            Self::read_complete(response).await?
        };

        let normalized = normalizer::normalize(&reply.content);
        debug!(
            chars = reply.content.len(),
            finish = ?reply.finish,
            has_trace = reply.trace.is_some() || normalized.trace.is_some(),
            "inference response received"
        );

        Ok(NormalizedResponse {
            content: normalized.content,
            trace: reply.trace.or(normalized.trace),
            raw: reply.content,
            finish: reply.finish,
        })
    }
}
