//! `solve`: run convergence loops on one problem until one succeeds.
//!
//! This is the worker the fleet launches. Stdout carries only the result;
//! operational logs go to stderr.

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::adapters::benchmark::BenchmarkSource;
use crate::adapters::checkpoint::FileCheckpointStore;
use crate::adapters::inference::OpenAiCompatClient;
use crate::adapters::transcript::{FileTranscript, NullTranscript};
use crate::cli::commands::bootstrap;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{LoopOutcome, COMPLETION_MARKER, EXIT_EXHAUSTED};
use crate::domain::ports::Transcript;
use crate::services::{ConvergenceLoop, PromptSet};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["problem_file", "benchmark"])))]
pub struct SolveArgs {
    /// File containing the problem statement
    pub problem_file: Option<PathBuf>,

    /// Benchmark CSV to take the problem from
    #[arg(long, requires = "benchmark_index")]
    pub benchmark: Option<PathBuf>,

    /// Row of the (level-filtered) benchmark to solve
    #[arg(long)]
    pub benchmark_index: Option<usize>,

    /// Only consider benchmark rows of this level
    #[arg(long)]
    pub level: Option<String>,

    /// Transcript file for prompts, drafts and verdicts
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Extra user prompts appended after the problem (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub other_prompts: Vec<String>,

    /// Independent runs to try before giving up
    #[arg(long)]
    pub max_runs: Option<u32>,

    /// Directory for resumable checkpoints
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Checkpoint name within the directory
    #[arg(long, default_value = "solve")]
    pub checkpoint_key: String,
}

#[derive(Debug, Serialize)]
pub struct SolveOutput {
    pub solved: bool,
    pub run: Option<u32>,
    pub runs_attempted: u32,
    pub message: String,
    pub solution: Option<String>,
}

impl CommandOutput for SolveOutput {
    fn to_human(&self) -> String {
        match &self.solution {
            Some(solution) => format!("{}\n\n{solution}", self.message),
            None => self.message.clone(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Exit code 0 with a solution, 2 when every run was abandoned.
pub async fn execute(args: SolveArgs, config_path: Option<&Path>, json_mode: bool) -> Result<i32> {
    let (config, _logger) = bootstrap(config_path, |config| {
        if let Some(max_runs) = args.max_runs {
            config.convergence.max_runs = max_runs;
        }
        if let Some(dir) = &args.checkpoint_dir {
            config.checkpoint.dir = Some(dir.clone());
        }
    })?;

    let problem = read_problem(&args)?;

    let transcript: Arc<dyn Transcript> = match &args.log {
        Some(path) => Arc::new(FileTranscript::open(path)?),
        None => Arc::new(NullTranscript),
    };

    let client = Arc::new(OpenAiCompatClient::new(
        config.inference.clone(),
        config.stream_guard,
    )?);
    let mut engine = ConvergenceLoop::new(
        client,
        Arc::new(PromptSet::default()),
        config.convergence,
        config.effort,
    )
    .with_transcript(Arc::clone(&transcript));
    if let Some(dir) = &config.checkpoint.dir {
        engine = engine.with_checkpoints(
            Arc::new(FileCheckpointStore::new(dir)),
            args.checkpoint_key.clone(),
        );
    }

    let max_runs = config.convergence.max_runs;
    for run in 1..=max_runs {
        let report = engine
            .run(&problem, &args.other_prompts)
            .instrument(info_span!("run", run, max_runs))
            .await?;

        match report.outcome {
            LoopOutcome::Succeeded { solution } => {
                let message = format!("{COMPLETION_MARKER} {run}.");
                transcript.record("Result", &format!("{message}\n\n{solution}"));
                info!(run, rounds = report.rounds, "solution found");
                output(
                    &SolveOutput {
                        solved: true,
                        run: Some(run),
                        runs_attempted: run,
                        message,
                        solution: Some(solution),
                    },
                    json_mode,
                );
                return Ok(0);
            }
            LoopOutcome::Abandoned { reason } => {
                warn!(run, ?reason, rounds = report.rounds, "run abandoned");
                transcript.record("Run abandoned", &format!("run {run}: {reason:?}"));
            }
        }
    }

    let message = format!("No correct solution found after {max_runs} runs.");
    transcript.record("Result", &message);
    output(
        &SolveOutput {
            solved: false,
            run: None,
            runs_attempted: max_runs,
            message,
            solution: None,
        },
        json_mode,
    );
    Ok(EXIT_EXHAUSTED)
}

fn read_problem(args: &SolveArgs) -> Result<String> {
    if let Some(csv) = &args.benchmark {
        let index = args.benchmark_index.unwrap_or_default();
        let source = BenchmarkSource::load(csv, args.level.as_deref())?;
        let problem = source.get(index)?;
        info!(problem_id = %problem.problem_id, index, "solving benchmark problem");
        return Ok(problem.problem.clone());
    }

    let path = args
        .problem_file
        .as_ref()
        .context("a problem file or --benchmark is required")?;
    let problem = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read problem file {}", path.display()))?;
    if problem.trim().is_empty() {
        anyhow::bail!("Problem file {} is empty", path.display());
    }
    Ok(problem)
}
