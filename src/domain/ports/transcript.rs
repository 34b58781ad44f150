//! Transcript port - the per-attempt log stream.

/// Receives the human-readable record of a loop: prompts, drafts, verdicts
/// and bug reports.
///
/// Writes are best effort; a failing sink must not stop the loop.
pub trait Transcript: Send + Sync {
    /// Append one entry under a section heading.
    fn record(&self, section: &str, body: &str);
}
