//! `fleet`: run N supervised `solve` workers in parallel.

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use console::style;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::adapters::benchmark::BenchmarkSource;
use crate::cli::commands::bootstrap;
use crate::cli::output::{fleet_table, output, CommandOutput};
use crate::domain::models::{FleetPolicy, FleetReport, InputAssignment};
use crate::infrastructure::process::{spawn_signal_forwarder, ShutdownToken};
use crate::services::{FleetCoordinator, WorkerLauncher};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["problem_file", "benchmark"])))]
pub struct FleetArgs {
    /// File containing the problem statement shared by every attempt
    pub problem_file: Option<PathBuf>,

    /// Number of attempts to launch
    #[arg(short = 'n', long)]
    pub num_attempts: Option<usize>,

    /// Maximum attempts running at once
    #[arg(short = 'w', long)]
    pub max_workers: Option<usize>,

    /// Per-attempt timeout in seconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Directory for attempt_NN.log files
    #[arg(short = 'd', long)]
    pub log_dir: Option<PathBuf>,

    /// Cancel the remaining attempts once one succeeds
    #[arg(short = 'e', long)]
    pub exit_on_first_success: bool,

    /// Benchmark CSV; attempt N takes row start-index + N - 1
    #[arg(long)]
    pub benchmark: Option<PathBuf>,

    /// Only consider benchmark rows of this level
    #[arg(long, requires = "benchmark")]
    pub level: Option<String>,

    /// First benchmark row handed out
    #[arg(long, default_value_t = 0)]
    pub benchmark_start_index: usize,

    /// Extra user prompts passed to every worker (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub other_prompts: Vec<String>,

    /// Time between the forwarded signal and SIGKILL
    #[arg(long)]
    pub grace_period_ms: Option<u64>,

    /// Directory for per-attempt resumable checkpoints
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct FleetOutput {
    #[serde(flatten)]
    pub report: FleetReport,
    pub success_rate: f64,
}

impl CommandOutput for FleetOutput {
    fn to_human(&self) -> String {
        let report = &self.report;
        let mut out = String::new();
        let _ = writeln!(out, "{}", fleet_table(report));
        let _ = writeln!(
            out,
            "\n{} {}/{} succeeded ({:.0}%), {} failed, {} timed out, {} cancelled in {:.1}s",
            style("Fleet:").bold(),
            report.succeeded,
            report.total,
            self.success_rate * 100.0,
            report.failed,
            report.timed_out,
            report.cancelled,
            report.elapsed.as_secs_f64(),
        );
        match (&report.winning_id, &report.winning_log) {
            (Some(id), Some(log)) => {
                let _ = writeln!(
                    out,
                    "{} attempt {id}, see {}",
                    style("Winner:").green().bold(),
                    log.display()
                );
                let solution = report.winner().map_or("", |w| w.stdout.trim());
                if !solution.is_empty() {
                    let _ = writeln!(out, "\n{}\n{solution}\n", style("Solution:").bold());
                }
            }
            _ => {
                let _ = writeln!(out, "{}", style("No attempt found a correct solution.").red());
            }
        }
        out.push_str("Logs:");
        for result in &report.results {
            let _ = write!(out, "\n  {}", result.log_path.display());
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Exit code 0 when at least one attempt succeeded, 1 otherwise.
pub async fn execute(args: FleetArgs, config_path: Option<&Path>, json_mode: bool) -> Result<i32> {
    let (config, _logger) = bootstrap(config_path, |config| {
        let fleet = &mut config.fleet;
        if let Some(n) = args.num_attempts {
            fleet.num_attempts = n;
        }
        if let Some(w) = args.max_workers {
            fleet.max_workers = Some(w);
        }
        if let Some(t) = args.timeout {
            fleet.timeout_secs = Some(t);
        }
        if let Some(dir) = &args.log_dir {
            fleet.log_dir = dir.clone();
        }
        if let Some(ms) = args.grace_period_ms {
            fleet.grace_period_ms = ms;
        }
        fleet.exit_on_first_success |= args.exit_on_first_success;
        if let Some(dir) = &args.checkpoint_dir {
            config.checkpoint.dir = Some(dir.clone());
        }
    })?;

    let assignment = assignment(&args, config.fleet.num_attempts)?;
    let program = std::env::current_exe().context("Failed to locate the proofloop executable")?;

    let launcher = WorkerLauncher::new(program, assignment, &config.fleet)
        .with_other_prompts(args.other_prompts.clone())
        .with_config_path(config_path.map(Path::to_path_buf))
        .with_checkpoint_dir(config.checkpoint.dir.clone());

    let shutdown = ShutdownToken::new();
    let forwarder = spawn_signal_forwarder(shutdown.clone())?;

    let coordinator = FleetCoordinator::new(Arc::new(launcher), &config.fleet, shutdown);
    let report = coordinator
        .run(FleetPolicy::from_flag(config.fleet.exit_on_first_success))
        .await;
    forwarder.abort();

    info!(
        succeeded = report.succeeded,
        total = report.total,
        winning_id = ?report.winning_id,
        "fleet finished"
    );

    let code = i32::from(!report.is_success());
    let success_rate = report.success_rate();
    output(&FleetOutput { report, success_rate }, json_mode);
    Ok(code)
}

/// Work out what each attempt solves, checking benchmark bounds up front so
/// no worker is launched for a row that does not exist.
fn assignment(args: &FleetArgs, num_attempts: usize) -> Result<InputAssignment> {
    let Some(csv) = &args.benchmark else {
        let problem_file = args
            .problem_file
            .clone()
            .context("a problem file or --benchmark is required")?;
        if !problem_file.is_file() {
            anyhow::bail!("Problem file {} does not exist", problem_file.display());
        }
        return Ok(InputAssignment::Shared { problem_file });
    };

    let source = BenchmarkSource::load(csv, args.level.as_deref())?;
    let start = args.benchmark_start_index;
    let end = start + num_attempts;
    if end > source.len() {
        anyhow::bail!(
            "Benchmark rows {start}..{end} requested but {} has only {} matching problems",
            csv.display(),
            source.len()
        );
    }

    Ok(InputAssignment::Benchmark {
        csv: csv.clone(),
        start_index: start,
        level: args.level.clone(),
    })
}
