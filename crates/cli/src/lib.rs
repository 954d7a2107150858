pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mall_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "mall",
    about = "Mall agents operator CLI",
    long_about = "Prepare the mall database, inspect configuration and run store/inventory resolution for a buyer request.",
    after_help = "Examples:\n  mall migrate\n  mall seed\n  mall resolve --prompt \"camiseta branca\"\n  mall resolve --prompt \"jogo de switch\" --guide"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo mall (stores, positions and inventory partitions)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Resolve store and inventory for a buyer request")]
    Resolve(commands::resolve::ResolveArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Resolve(args) => commands::resolve::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Diagnostics go to stderr; stdout carries command output only.
pub fn init_logging(logging: &LoggingConfig) {
    use tracing::Level;

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
