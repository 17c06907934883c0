//! Client cache token commands.

use autopush::client_state::ClientCacheChecker;
use autopush::config::{AutoPushConfig, ClientStateConfig};
use clap::Subcommand;

use crate::error::CliError;

/// Token subcommands.
#[derive(Debug, Subcommand)]
pub enum TokenCommands {
    /// Decode a token and show its filter parameters
    Inspect {
        /// Token as sent by the client
        token: String,
    },

    /// Report whether a token may contain each path
    Check {
        /// Token as sent by the client
        token: String,

        /// Request paths to test
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Build a token holding the given paths
    New {
        /// Request paths to add
        paths: Vec<String>,

        /// Paths the filter is sized for (defaults to config)
        #[arg(long)]
        capacity: Option<usize>,
    },
}

/// Run a token subcommand.
pub fn run(command: TokenCommands, config: &AutoPushConfig) -> Result<(), CliError> {
    match command {
        TokenCommands::Inspect { token } => {
            let checker = decode(&token)?;
            println!("{}", describe(&checker));
            Ok(())
        }
        TokenCommands::Check { token, paths } => {
            let checker = decode(&token)?;
            for path in &paths {
                let verdict = if checker.may_have_path(path) { "maybe" } else { "no" };
                println!("{:<6} {}", verdict, path);
            }
            Ok(())
        }
        TokenCommands::New { paths, capacity } => {
            let sizing = match capacity {
                Some(capacity) => ClientStateConfig { capacity },
                None => config.client_state.clone(),
            };
            sizing.validate()?;
            println!("{}", build(sizing.capacity, &paths));
            Ok(())
        }
    }
}

fn decode(token: &str) -> Result<ClientCacheChecker, CliError> {
    ClientCacheChecker::try_deserialize(token).map_err(|e| CliError::Token(e.to_string()))
}

fn build(capacity: usize, paths: &[String]) -> String {
    let mut checker = ClientCacheChecker::with_capacity(capacity);
    for path in paths {
        checker.add_path(path);
    }
    checker.serialize()
}

fn describe(checker: &ClientCacheChecker) -> String {
    format!(
        "bits: {}\nhash functions: {}\nbits set: {} ({:.1}%)\nestimated false positive rate: {:.4}",
        checker.bit_len(),
        checker.hash_count(),
        checker.bits_set(),
        100.0 * checker.bits_set() as f64 / checker.bit_len() as f64,
        checker.estimated_false_positive_rate()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_token_contains_paths() {
        let token = build(100, &["/a.js".to_string(), "/b.css".to_string()]);
        let checker = decode(&token).unwrap();
        assert!(checker.may_have_path("/a.js"));
        assert!(checker.may_have_path("/b.css"));
        assert_eq!(checker.bit_len(), 960);
    }

    #[test]
    fn test_new_rejects_capacity_beyond_token_limit() {
        let config = AutoPushConfig::default();
        let too_big = autopush::client_state::max_capacity() + 1;
        let err = run(
            TokenCommands::New {
                paths: vec!["/a.js".to_string()],
                capacity: Some(too_big),
            },
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));

        let err = run(
            TokenCommands::New {
                paths: vec![],
                capacity: Some(0),
            },
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("%%%"), Err(CliError::Token(_))));
    }

    #[test]
    fn test_describe_reports_parameters() {
        let checker = decode(&build(100, &[])).unwrap();
        let text = describe(&checker);
        assert!(text.contains("bits: 960"));
        assert!(text.contains("hash functions: 7"));
        assert!(text.contains("bits set: 0"));
    }
}
