//! Main entry point for the telcall CLI
//!
//! Inspects the call state table, validates configuration files and runs
//! scripted call scenarios against a loopback radio.

mod cli;
mod commands;
mod logging;

use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::setup_logging(cli.verbose, cli.json_logs) {
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
