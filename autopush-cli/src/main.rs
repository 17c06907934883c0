//! AutoPush CLI - Command-line interface
//!
//! Replays access logs through the learning cache and inspects client cache
//! tokens.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use autopush::logging::{self, LogOptions};
use clap::{ArgAction, Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use commands::token::TokenCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "autopush", version, about = "Learned HTTP/2 server push")]
struct Cli {
    /// Configuration file (defaults to the per-user config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to rotated files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay an access log and report what would be learned and pushed
    Replay(ReplayArgs),

    /// Work with client cache tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut options = LogOptions::default();
    if let Some(dir) = cli.log_dir {
        options = options.with_log_dir(dir);
    }
    match cli.verbose {
        0 => {}
        1 => options = options.with_filter("autopush=debug"),
        _ => options = options.with_filter("autopush=trace"),
    }
    let _guard = logging::init(&options)?;

    let config = commands::load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "Effective configuration");

    match cli.command {
        Commands::Replay(args) => commands::replay::run(args, config),
        Commands::Token { command } => commands::token::run(command, &config),
        Commands::Config { command } => commands::config::run(command, &config),
    }
}
