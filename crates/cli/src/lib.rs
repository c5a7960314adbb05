pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "covermatch",
    about = "Covermatch operator CLI",
    long_about = "Ingest product catalogs, run recommendations, inspect configuration, \
                  and check runtime readiness.",
    after_help = "Examples:\n  covermatch ingest catalog.json\n  covermatch recommend profile.json\n  covermatch doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Normalize a JSON catalog file and upsert it into the product index")]
    Ingest {
        #[arg(help = "Path to a JSON array of raw product records")]
        file: PathBuf,
    },
    #[command(about = "Score the catalog against a user profile and print ranked products")]
    Recommend {
        #[arg(help = "Path to a JSON user profile")]
        profile: PathBuf,
        #[arg(long, help = "Override the configured number of results")]
        top: Option<usize>,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Validate configuration and index connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ingest { file } => commands::ingest::run(&file).await,
        Command::Recommend { profile, top } => commands::recommend::run(&profile, top).await,
        Command::Config => commands::config::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json).await }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
