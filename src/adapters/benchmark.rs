//! CSV benchmark loader.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::BenchmarkProblem;

/// Problems read from a benchmark CSV, optionally filtered by level.
#[derive(Debug, Clone)]
pub struct BenchmarkSource {
    problems: Vec<BenchmarkProblem>,
}

impl BenchmarkSource {
    /// Read `path`, keeping only rows whose level matches `level` when given.
    pub fn load(path: impl AsRef<Path>, level: Option<&str>) -> DomainResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| DomainError::Benchmark(format!("Failed to open {}: {e}", path.display())))?;

        let mut problems = Vec::new();
        for (row, record) in reader.deserialize::<BenchmarkProblem>().enumerate() {
            let problem = record.map_err(|e| {
                DomainError::Benchmark(format!("{}: bad row {}: {e}", path.display(), row + 1))
            })?;
            if level.is_none_or(|level| problem.matches_level(level)) {
                problems.push(problem);
            }
        }

        debug!(path = %path.display(), level = ?level, count = problems.len(), "benchmark loaded");
        Ok(Self { problems })
    }

    pub fn get(&self, index: usize) -> DomainResult<&BenchmarkProblem> {
        self.problems.get(index).ok_or_else(|| {
            DomainError::Benchmark(format!(
                "index {index} out of range ({} problems)",
                self.problems.len()
            ))
        })
    }

    /// Distinct levels, sorted.
    pub fn levels(&self) -> Vec<String> {
        self.problems
            .iter()
            .filter_map(BenchmarkProblem::level)
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Problem ID,Problem,Solution").unwrap();
        writeln!(file, "PB-Basic-001,\"Show that 1 + 1 = 2.\",x").unwrap();
        writeln!(file, "PB-Advanced-001,\"Prove, with care, the claim.\",y").unwrap();
        writeln!(file, "PB-Basic-002,Third,z").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_all_rows() {
        let file = write_csv();
        let source = BenchmarkSource::load(file.path(), None).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.get(1).unwrap().problem, "Prove, with care, the claim.");
        assert_eq!(source.levels(), vec!["Advanced", "Basic"]);
    }

    #[test]
    fn test_level_filter_ignores_case() {
        let file = write_csv();
        let source = BenchmarkSource::load(file.path(), Some("basic")).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.get(1).unwrap().problem_id, "PB-Basic-002");
    }

    #[test]
    fn test_out_of_range_index() {
        let file = write_csv();
        let source = BenchmarkSource::load(file.path(), Some("Advanced")).unwrap();
        assert!(matches!(source.get(1), Err(DomainError::Benchmark(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = BenchmarkSource::load("/nonexistent/benchmark.csv", None);
        assert!(matches!(result, Err(DomainError::Benchmark(_))));
    }
}
