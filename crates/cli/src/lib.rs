pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "intune",
    about = "InTuneAI operator CLI",
    long_about = "Inspect configuration, agent catalog and session store readiness for the agent service.",
    after_help = "Examples:\n  intune doctor --json\n  intune config\n  intune catalog"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Print effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, the agent catalog and the session store")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List agent apps discovered in the agents directory")]
    Catalog,
    #[command(about = "Apply pending session-store migrations")]
    Migrate,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Catalog => commands::catalog::run(),
        Command::Migrate => commands::migrate::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
