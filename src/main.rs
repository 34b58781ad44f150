//! proofloop CLI entry point.

use clap::Parser;

use proofloop::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = proofloop::cli::run(cli).await;
    std::process::exit(code);
}
