//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use serde_json::json;

/// Dispatch a parsed command line. Returns the process exit code.
pub async fn run(cli: Cli) -> i32 {
    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Solve(args) => commands::solve::execute(args, config, cli.json).await,
        Commands::Fleet(args) => commands::fleet::execute(args, config, cli.json).await,
        Commands::Benchmark(args) => commands::benchmark::execute(args, cli.json),
    };

    match result {
        Ok(code) => code,
        Err(err) => handle_error(&err, cli.json),
    }
}

/// Report a command failure. Returns the exit code for errors.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> i32 {
    if json_mode {
        let body = json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    1
}
