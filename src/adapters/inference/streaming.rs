//! Incremental (SSE) delivery for OpenAI-compatible chat completions.
//!
//! Fragments arrive as `data: {json}` lines terminated by `data: [DONE]`.
//! A [`StreamGuard`] cuts delivery short when the provider degenerates into
//! a repeating tail or an unbounded answer; the partial text is still a
//! usable response.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FinishReason, StreamGuardConfig};

/// Why the guard stopped accepting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStop {
    Repetition,
    LengthCap,
}

/// Accumulates streamed content and watches for degenerate output.
///
/// Text is accepted one char at a time so the cut lands exactly where the
/// condition first holds, whatever the fragment sizes.
#[derive(Debug)]
pub struct StreamGuard {
    config: StreamGuardConfig,
    chars: Vec<char>,
    stopped: Option<GuardStop>,
}

impl StreamGuard {
    pub const fn new(config: StreamGuardConfig) -> Self {
        Self {
            config,
            chars: Vec::new(),
            stopped: None,
        }
    }

    /// Append a fragment. Returns the stop reason once the guard has fired;
    /// further input is ignored.
    pub fn push(&mut self, fragment: &str) -> Option<GuardStop> {
        if self.stopped.is_some() {
            return self.stopped;
        }
        for ch in fragment.chars() {
            if self.chars.len() >= self.config.max_content_chars {
                self.stopped = Some(GuardStop::LengthCap);
                break;
            }
            self.chars.push(ch);
            if self.tail_repeats() {
                self.stopped = Some(GuardStop::Repetition);
                break;
            }
        }
        self.stopped
    }

    /// True when the last window equals each of the `threshold` windows
    /// immediately before it.
    fn tail_repeats(&self) -> bool {
        let window = self.config.repetition_window;
        let needed = window * (self.config.repetition_threshold + 1);
        let len = self.chars.len();
        if window == 0 || len < needed {
            return false;
        }
        let last = &self.chars[len - window..];
        (1..=self.config.repetition_threshold).all(|k| {
            let end = len - k * window;
            &self.chars[end - window..end] == last
        })
    }

    pub const fn stopped(&self) -> Option<GuardStop> {
        self.stopped
    }

    pub fn char_count(&self) -> usize {
        self.chars.len()
    }

    pub fn content(&self) -> String {
        self.chars.iter().collect()
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
    thinking: Option<String>,
    reasoning_content: Option<String>,
}

/// Payload of one SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
}

pub fn parse_sse_line(line: &str) -> Option<SseLine<'_>> {
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        Some(SseLine::Done)
    } else if data.is_empty() {
        None
    } else {
        Some(SseLine::Data(data))
    }
}

/// Assembled result of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedReply {
    pub content: String,
    pub trace: Option<String>,
    pub finish: FinishReason,
}

/// Folds SSE lines into a [`StreamedReply`].
#[derive(Debug)]
pub struct StreamAccumulator {
    guard: StreamGuard,
    trace: String,
    finish_reason: Option<String>,
    parsed_chunks: usize,
    done: bool,
}

impl StreamAccumulator {
    pub const fn new(config: StreamGuardConfig) -> Self {
        Self {
            guard: StreamGuard::new(config),
            trace: String::new(),
            finish_reason: None,
            parsed_chunks: 0,
            done: false,
        }
    }

    /// Feed one line. Returns false once no more input should be read.
    pub fn accept_line(&mut self, line: &str) -> bool {
        match parse_sse_line(line) {
            None => true,
            Some(SseLine::Done) => {
                self.done = true;
                false
            }
            Some(SseLine::Data(data)) => match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => {
                    self.parsed_chunks += 1;
                    self.apply(chunk)
                }
                Err(err) => {
                    warn!(error = %err, chunk = %truncate(data, 100), "skipping unparsable stream chunk");
                    true
                }
            },
        }
    }

    fn apply(&mut self, chunk: StreamChunk) -> bool {
        let Some(choice) = chunk.choices.into_iter().next() else {
            return true;
        };
        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(reason);
        }
        for thinking in [choice.delta.thinking, choice.delta.reasoning_content]
            .into_iter()
            .flatten()
        {
            self.trace.push_str(&thinking);
        }
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            if let Some(stop) = self.guard.push(&content) {
                warn!(?stop, chars = self.guard.char_count(), "stream guard stopped generation");
                return false;
            }
        }
        true
    }

    pub fn finish(self) -> DomainResult<StreamedReply> {
        if self.parsed_chunks == 0 {
            return Err(DomainError::Protocol(
                "no valid response chunks received".to_string(),
            ));
        }
        let finish = match self.guard.stopped() {
            Some(GuardStop::Repetition) => FinishReason::Repetition,
            Some(GuardStop::LengthCap) => FinishReason::LengthCap,
            None => FinishReason::from_wire(self.finish_reason.as_deref()),
        };
        debug!(
            chunks = self.parsed_chunks,
            chars = self.guard.char_count(),
            done_marker = self.done,
            "stream complete"
        );
        Ok(StreamedReply {
            content: self.guard.content(),
            trace: Some(self.trace).filter(|t| !t.is_empty()),
            finish,
        })
    }
}

/// Consume a byte stream of SSE lines until `[DONE]`, the guard fires, or
/// the stream ends.
pub async fn collect_sse<S, E>(stream: S, config: StreamGuardConfig) -> DomainResult<StreamedReply>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<DomainError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut accumulator = StreamAccumulator::new(config);
    let mut buffer: Vec<u8> = Vec::new();
    let mut reading = true;

    'read: while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk.map_err(Into::<DomainError>::into)?);
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if !accumulator.accept_line(line.trim_end_matches(['\r', '\n'])) {
                reading = false;
                break 'read;
            }
        }
    }
    if reading && !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).into_owned();
        accumulator.accept_line(line.trim_end());
    }

    accumulator.finish()
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
