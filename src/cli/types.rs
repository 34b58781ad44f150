//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::benchmark::BenchmarkArgs;
use super::commands::fleet::FleetArgs;
use super::commands::solve::SolveArgs;

#[derive(Parser, Debug)]
#[command(name = "proofloop")]
#[command(about = "Generate, verify and correct proofs against a reasoning service", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file merged over .proofloop/config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the convergence loop on one problem (one worker)
    Solve(SolveArgs),

    /// Run many supervised solve attempts in parallel
    Fleet(FleetArgs),

    /// Inspect benchmark files
    Benchmark(BenchmarkArgs),
}
