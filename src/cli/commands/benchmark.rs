//! Benchmark CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::adapters::benchmark::BenchmarkSource;
use crate::cli::output::{output, CommandOutput};

#[derive(Args, Debug)]
pub struct BenchmarkArgs {
    #[command(subcommand)]
    pub command: BenchmarkCommands,
}

#[derive(Subcommand, Debug)]
pub enum BenchmarkCommands {
    /// List the distinct difficulty levels in a benchmark CSV
    Levels {
        /// Benchmark CSV with `Problem ID` and `Problem` columns
        csv: PathBuf,
    },
}

#[derive(Debug, Serialize)]
pub struct LevelsOutput {
    pub csv: String,
    pub problems: usize,
    pub levels: Vec<String>,
}

impl CommandOutput for LevelsOutput {
    fn to_human(&self) -> String {
        if self.levels.is_empty() {
            return format!("No levels found in {} ({} problems).", self.csv, self.problems);
        }
        let mut lines = vec![format!(
            "{} level(s) across {} problems in {}:",
            self.levels.len(),
            self.problems,
            self.csv
        )];
        lines.extend(self.levels.iter().map(|level| format!("  {level}")));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(args: BenchmarkArgs, json_mode: bool) -> Result<i32> {
    match args.command {
        BenchmarkCommands::Levels { csv } => {
            let source = BenchmarkSource::load(&csv, None)?;
            let out = LevelsOutput {
                csv: csv.display().to_string(),
                problems: source.len(),
                levels: source.levels(),
            };
            output(&out, json_mode);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_output_human() {
        let out = LevelsOutput {
            csv: "bench.csv".to_string(),
            problems: 3,
            levels: vec!["Advanced".to_string(), "Basic".to_string()],
        };
        assert_eq!(
            out.to_human(),
            "2 level(s) across 3 problems in bench.csv:\n  Advanced\n  Basic"
        );
        assert_eq!(out.to_json()["levels"][1], "Basic");
    }
}
