//! Command-line interface built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (config, fetch-user,
//! process) and the global flags (--config, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Retry with backoff, configuration fallback and graceful degradation.
#[derive(Debug, Parser)]
#[command(name = "resilience", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (JSON, or TOML by extension).
    #[arg(
        long,
        global = true,
        env = "RESILIENCE_CONFIG",
        default_value = "resilience.json"
    )]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the effective configuration and its validation issues.
    Config {
        /// Print only this key.
        #[arg(long)]
        key: Option<String>,
    },

    /// Fetch a user over the simulated network, falling back on failure.
    FetchUser {
        /// User identifier.
        id: u64,

        /// Probability that a single simulated call succeeds.
        #[arg(long, default_value_t = resilience::network::DEFAULT_FETCH_SUCCESS_RATE)]
        success_rate: f64,

        /// Seed for the simulated network.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[command(flatten)]
        retry: RetryArgs,
    },

    /// Process a JSON array of items, skipping failures.
    Process {
        /// Path to the batch file.
        file: PathBuf,

        /// Probability of an injected failure per valid item.
        #[arg(long, default_value_t = 0.0)]
        fault_rate: f64,

        /// Seed for fault injection.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

/// Retry policy overrides.
#[derive(Debug, Args)]
pub struct RetryArgs {
    /// Maximum number of attempts.
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Delay after the first failure, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub base_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds.
    #[arg(long, default_value_t = 60_000)]
    pub max_delay_ms: u64,
}
