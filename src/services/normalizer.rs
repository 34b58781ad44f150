//! Response normalization.
//!
//! Reasoning models served through OpenAI-compatible endpoints may leak their
//! channel framing into `content`, e.g.
//! `<|channel|>analysis<|message|>...<|end|><|start|>assistant<|channel|>final<|message|>answer`.
//! Everything handed to extraction or replayed to the provider goes through
//! [`normalize`] first.

use regex::Regex;
use std::sync::LazyLock;

static CONTROL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|[^|]+\|>").expect("control marker pattern is valid"));

/// A channel header with its name and optional constraint, or a start
/// marker with its role. Removed as one unit so the names never reach content.
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\|channel\|>[^<]*(?:<\|constrain\|>[^<]*)?<\|message\|>|<\|start\|>\w*")
        .expect("header pattern is valid")
});

const FINAL_HEADER: &str = "<|channel|>final<|message|>";
const ANALYSIS_HEADER: &str = "<|channel|>analysis<|message|>";
const TERMINATORS: [&str; 3] = ["<|end|>", "<|return|>", "<|call|>"];

/// Canonical message plus the optional reasoning trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub content: String,
    pub trace: Option<String>,
}

/// Split raw provider text into canonical content and trace.
///
/// - With a final-channel header, the content is the payload after the last
///   header, without its terminator or residual markers.
/// - Otherwise, if any marker is present, all markers are stripped.
/// - Otherwise the text is returned unchanged.
///
/// Normalizing already-normalized content is a no-op.
pub fn normalize(raw: &str) -> Normalized {
    let trace = analysis_trace(raw);

    if let Some(idx) = raw.rfind(FINAL_HEADER) {
        let mut payload = raw[idx + FINAL_HEADER.len()..].trim_end();
        for terminator in TERMINATORS {
            if let Some(stripped) = payload.strip_suffix(terminator) {
                payload = stripped;
                break;
            }
        }
        return Normalized {
            content: strip_markers(payload),
            trace,
        };
    }

    if has_markers(raw) {
        return Normalized {
            content: strip_markers(raw),
            trace,
        };
    }

    Normalized {
        content: raw.to_string(),
        trace,
    }
}

/// Content-only shorthand for [`normalize`].
pub fn normalize_content(raw: &str) -> String {
    normalize(raw).content
}

pub fn has_markers(text: &str) -> bool {
    CONTROL_MARKER.is_match(text)
}

/// Remove channel headers, role markers and every remaining control marker,
/// then trim. Repeats until stable because removing one marker can join the
/// halves of another.
fn strip_markers(text: &str) -> String {
    let mut current = text.to_string();
    while CONTROL_MARKER.is_match(&current) {
        current = HEADER.replace_all(&current, "").into_owned();
        current = CONTROL_MARKER.replace_all(&current, "").into_owned();
    }
    current.trim().to_string()
}

/// Payloads of every analysis channel, each running up to the next marker.
fn analysis_trace(raw: &str) -> Option<String> {
    let parts: Vec<String> = raw
        .match_indices(ANALYSIS_HEADER)
        .map(|(idx, _)| {
            let rest = &raw[idx + ANALYSIS_HEADER.len()..];
            let end = CONTROL_MARKER.find(rest).map_or(rest.len(), |m| m.start());
            rest[..end].trim().to_string()
        })
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
