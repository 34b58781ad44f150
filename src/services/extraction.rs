//! Marker-based section extraction.
//!
//! Generated solutions are expected to end with a `### Summary ###` section
//! followed by `### Detailed Solution ###`; verifier reports carry a summary
//! followed by a `Detailed Verification` log. Extraction never guesses: a
//! missing marker yields `NoDraftFound` or an empty section.

use crate::domain::errors::{DomainError, DomainResult};

pub const SUMMARY_MARKER: &str = "Summary";
pub const SECTION_PREFIX: &str = "### ";
pub const DETAILED_SOLUTION_MARKER: &str = "Detailed Solution";
pub const DETAILED_VERIFICATION_MARKER: &str = "Detailed Verification";

/// Text from the last summary marker to the end, trimmed. When the marker is
/// immediately preceded by `### ` that prefix is kept.
pub fn extract_summary(text: &str) -> Option<String> {
    let idx = text.rfind(SUMMARY_MARKER)?;
    let prefix_len = SECTION_PREFIX.len();
    let start = if idx >= prefix_len
        && text.is_char_boundary(idx - prefix_len)
        && &text[idx - prefix_len..idx] == SECTION_PREFIX
    {
        idx - prefix_len
    } else {
        idx
    };
    Some(text[start..].trim().to_string())
}

/// The candidate draft in a generation response.
pub fn extract_draft(text: &str) -> DomainResult<String> {
    extract_summary(text).ok_or(DomainError::NoDraftFound)
}

/// Trimmed text after the first `marker`, or empty if absent.
pub fn section_after(text: &str, marker: &str) -> String {
    text.find(marker)
        .map(|idx| text[idx + marker.len()..].trim().to_string())
        .unwrap_or_default()
}

/// Trimmed text before the first `marker`, or empty if absent.
pub fn section_before(text: &str, marker: &str) -> String {
    text.find(marker)
        .map(|idx| text[..idx].trim().to_string())
        .unwrap_or_default()
}

/// The part of a draft sent to the verifier.
pub fn detailed_solution(draft: &str) -> String {
    let summary = extract_summary(draft).unwrap_or_default();
    section_after(&summary, DETAILED_SOLUTION_MARKER)
}

/// Bug report inside a verifier's text: everything in its summary that
/// precedes the detailed verification log. Empty if either marker is absent.
pub fn bug_report(verifier_text: &str) -> String {
    extract_summary(verifier_text)
        .map(|summary| section_before(&summary, DETAILED_VERIFICATION_MARKER))
        .unwrap_or_default()
}
