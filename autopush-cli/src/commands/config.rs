//! Configuration CLI commands.

use autopush::config::AutoPushConfig;
use clap::Subcommand;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the default configuration file path
    Path,

    /// Show the effective configuration as JSON
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config: &AutoPushConfig) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(config),
    }
}

fn run_path() -> Result<(), CliError> {
    match autopush::config::config_file_path() {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(CliError::Config(
            "No configuration directory on this platform".to_string(),
        )),
    }
}

fn run_show(config: &AutoPushConfig) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
