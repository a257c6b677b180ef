pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "aerolens",
    about = "Aerolens operator CLI",
    long_about = "Operate the Aerolens query engine: one-shot queries, classifier dry runs, \
                  config inspection, and readiness checks.",
    after_help = "Examples:\n  aerolens ask --text \"Which routes have the most delays?\"\n  \
                  aerolens classify --text \"How do maintenance issues affect flight delays?\"\n  \
                  aerolens doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Submit one query through the engine and print the answer with a dispatch summary")]
    Ask {
        #[arg(long, help = "Query text to submit")]
        text: String,
        #[arg(long, default_value = "cli_session", help = "Session id for multi-turn context")]
        session: String,
    },
    #[command(about = "Dry-run the intent classifier and print the routing decision")]
    Classify {
        #[arg(long, help = "Query text to classify")]
        text: String,
    },
    #[command(about = "Inspect effective configuration values with secret redaction")]
    Config,
    #[command(about = "Validate config and probe gateway and reasoning-client readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { text, session } => commands::ask::run(&text, &session),
        Command::Classify { text } => {
            commands::CommandResult { exit_code: 0, output: commands::classify::run(&text) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
