//! Conversation domain models.
//!
//! A conversation is the ordered list of role-tagged messages sent to the
//! inference service. The loop only appends to a conversation; starting a
//! correction round builds a brand-new one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Reasoning trace replayed alongside assistant turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            thinking: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            thinking: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            thinking: None,
        }
    }

    #[must_use]
    pub fn with_thinking(mut self, thinking: Option<String>) -> Self {
        self.thinking = thinking.filter(|t| !t.is_empty());
        self
    }
}

/// Ordered, append-only sequence of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the opening conversation: system prompt, the question, then any
    /// auxiliary prompts as further user turns.
    pub fn opening(system_prompt: &str, question: &str, other_prompts: &[String]) -> Self {
        let mut conversation = Self::new();
        conversation.push(ChatMessage::system(system_prompt));
        conversation.push(ChatMessage::user(question));
        for prompt in other_prompts {
            conversation.push(ChatMessage::user(prompt.clone()));
        }
        conversation
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// Coarse deliberation knob sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    Medium,
    #[default]
    High,
}

impl EffortLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffortLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown effort level: {other}")),
        }
    }
}

/// Why the provider stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    /// Incremental delivery was cut because the tail kept repeating.
    Repetition,
    /// Incremental delivery was cut at the content size cap.
    LengthCap,
    Other(String),
}

impl FinishReason {
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            None | Some("stop") => Self::Stop,
            Some("length") => Self::Length,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    /// True when the stream guard forcibly ended delivery.
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Repetition | Self::LengthCap)
    }
}

/// Provider response after control markers have been stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    /// Canonical plain-text message.
    pub content: String,
    /// Side-channel reasoning trace, if the provider sent one.
    pub trace: Option<String>,
    /// Content exactly as delivered.
    pub raw: String,
    pub finish: FinishReason,
}

impl NormalizedResponse {
    /// Text used for marker extraction: the trace (if any) followed by the
    /// content, so a summary emitted in either channel is found.
    pub fn full_text(&self) -> String {
        match &self.trace {
            Some(trace) if !trace.is_empty() => format!("{trace}\n\n{}", self.content),
            _ => self.content.clone(),
        }
    }

    /// Assistant message replayed in multi-turn context.
    pub fn to_assistant_message(&self) -> ChatMessage {
        ChatMessage::assistant(self.content.clone()).with_thinking(self.trace.clone())
    }
}
