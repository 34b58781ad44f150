//! Benchmark problem rows.

use serde::{Deserialize, Serialize};

/// One row of a benchmark CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkProblem {
    #[serde(rename = "Problem ID")]
    pub problem_id: String,
    #[serde(rename = "Problem")]
    pub problem: String,
}

impl BenchmarkProblem {
    /// Level token: the second hyphen-delimited segment of the id
    /// (`PB-Basic-001` is `Basic`).
    pub fn level(&self) -> Option<&str> {
        self.problem_id.split('-').nth(1).filter(|level| !level.is_empty())
    }

    pub fn matches_level(&self, level: &str) -> bool {
        self.level().is_some_and(|own| own.eq_ignore_ascii_case(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(id: &str) -> BenchmarkProblem {
        BenchmarkProblem {
            problem_id: id.to_string(),
            problem: "Prove it.".to_string(),
        }
    }

    #[test]
    fn test_level_is_second_segment() {
        assert_eq!(problem("PB-Basic-001").level(), Some("Basic"));
        assert_eq!(problem("PB-Advanced-010").level(), Some("Advanced"));
        assert_eq!(problem("PB").level(), None);
    }

    #[test]
    fn test_level_match_ignores_case() {
        assert!(problem("PB-Basic-001").matches_level("basic"));
        assert!(!problem("PB-Basic-001").matches_level("advanced"));
    }
}
