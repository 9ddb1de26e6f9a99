use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::commands;

#[derive(Parser, Debug)]
#[command(name = "telcall", author, version, about = "Telephony call engine toolbox", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "TELCALL_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the call state transition table
    Table {
        /// Output format
        #[arg(long, value_enum, default_value_t = TableFormat::Text)]
        format: TableFormat,
    },

    /// Run a scripted scenario against a loopback radio and print every
    /// event as a JSON line
    Simulate {
        /// Scenario to run
        #[arg(value_enum, default_value_t = Scenario::Basic)]
        scenario: Scenario,

        /// Number to dial
        #[arg(short, long, default_value = "10086")]
        number: String,

        /// Engine configuration (TOML)
        #[arg(short, long, env = "TELCALL_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to the TOML file
        path: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Dial, hold, resume and hang up one call
    Basic,
    /// Answer an incoming call, then take a waiting one
    Incoming,
    /// Merge two calls into a conference and tear it down
    Conference,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Command::Table { format } => commands::table::execute(format),
            Command::Simulate {
                scenario,
                number,
                config,
            } => commands::simulate::execute(scenario, &number, config.as_deref()).await,
            Command::CheckConfig { path } => commands::check_config::execute(&path),
        }
    }
}
