//! Transcript sinks: file, memory and null.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::Transcript;

fn render(section: &str, body: &str) -> String {
    format!(">>>>>>> {section}\n{body}\n")
}

/// Appends entries to a log file.
pub struct FileTranscript {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileTranscript {
    /// Open `path` for appending, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| DomainError::Io(format!("Failed to open log file {}: {e}", path.display())))?;
        let transcript = Self {
            path,
            file: Mutex::new(file),
        };
        transcript.record("Transcript opened", &Utc::now().to_rfc3339());
        Ok(transcript)
    }
}

impl Transcript for FileTranscript {
    fn record(&self, section: &str, body: &str) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file
            .write_all(render(section, body).as_bytes())
            .and_then(|()| file.flush())
        {
            warn!(path = %self.path.display(), error = %e, "failed to write transcript entry");
        }
    }
}

/// Keeps entries in memory.
#[derive(Default)]
pub struct MemoryTranscript {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bodies recorded under `section`.
    pub fn section(&self, section: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(s, _)| s == section)
            .map(|(_, body)| body)
            .collect()
    }

    pub fn render(&self) -> String {
        self.entries()
            .iter()
            .map(|(section, body)| render(section, body))
            .collect()
    }
}

impl Transcript for MemoryTranscript {
    fn record(&self, section: &str, body: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((section.to_string(), body.to_string()));
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTranscript;

impl Transcript for NullTranscript {
    fn record(&self, _section: &str, _body: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_transcript_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("attempt_01.log");
        let transcript = FileTranscript::open(&path).unwrap();
        transcript.record("Draft", "### Summary ###");
        transcript.record("Verdict", "yes");
        drop(transcript);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(">>>>>>> Transcript opened\n"));
        assert!(text.contains(">>>>>>> Draft\n### Summary ###\n"));
        assert!(text.ends_with(">>>>>>> Verdict\nyes\n"));
    }

    #[test]
    fn test_memory_transcript_sections() {
        let transcript = MemoryTranscript::new();
        transcript.record("Bug report", "gap");
        transcript.record("Draft", "d1");
        transcript.record("Draft", "d2");
        assert_eq!(transcript.section("Draft"), vec!["d1", "d2"]);
        assert!(transcript.render().contains(">>>>>>> Bug report\ngap\n"));
    }
}
