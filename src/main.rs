mod cli;
mod ui;

use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use console::Style;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use resilience::config::{self, ConfigManager};
use resilience::error::{FileAccessError, PolicyViolation};
use resilience::network::{self, SimulatedNetwork};
use resilience::processor::{self, DataProcessor, RandomFaults};
use resilience::retry::{RetryExecutor, RetryPolicy};
use resilience::safe_file;

fn main() {
    let cli = Cli::parse();

    let directive = log_directive(
        cli.verbose,
        std::env::var("RUST_LOG").ok(),
        std::env::var("RESILIENCE_LOG").ok(),
    );
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", Style::new().red().bold().apply_to("Error:"));

        let exit_code = if e.downcast_ref::<PolicyViolation>().is_some() {
            2
        } else if e.downcast_ref::<FileAccessError>().is_some() {
            3
        } else {
            1
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ConfigManager::load(&cli.config);

    match cli.command {
        Command::Config { key: Some(key) } => match config.get(&key, None) {
            Some(value) => println!("{value}"),
            None => bail!("no value or default for key '{key}'"),
        },
        Command::Config { key: None } => {
            ui::report_config(config.source(), &config.effective(), &config.validate());
        }
        Command::FetchUser {
            id,
            success_rate,
            seed,
            retry,
        } => {
            let policy =
                RetryPolicy::from_millis(retry.max_attempts, retry.base_delay_ms, retry.max_delay_ms)?;
            let network = SimulatedNetwork::new(success_rate, seed)?;
            let executor = RetryExecutor::new(policy);

            let progress = ui::Progress::start(&format!("Fetching user {id}"));
            let user = network::fetch_user_data(id, &network, &executor);
            progress.report_user(&user);
        }
        Command::Process {
            file,
            fault_rate,
            seed,
        } => {
            let items = read_batch(&file)?;
            let mut processor = DataProcessor::with_fault_injector(
                processor::configured_max_errors(&config),
                RandomFaults::new(fault_rate, seed)?,
            );

            let progress = ui::Progress::start(&format!("Processing {} items", items.len()));
            let processed = processor.process_all(&items);
            progress.report_batch(&processed, items.len(), processor.error_budget());
        }
    }

    Ok(())
}

/// Filter directive: `--verbose`, then `RUST_LOG`, then `RESILIENCE_LOG`, then `warn`.
fn log_directive(
    verbose: bool,
    rust_log: Option<String>,
    resilience_log: Option<String>,
) -> String {
    if verbose {
        return "debug".to_string();
    }
    [rust_log, resilience_log]
        .into_iter()
        .flatten()
        .find(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| "warn".to_string())
}

fn read_batch(path: &std::path::Path) -> Result<Vec<Value>> {
    let contents = safe_file::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse batch file {}", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        other => bail!(
            "batch file {} must contain a JSON array, got {}",
            path.display(),
            config::json_kind(&other)
        ),
    }
}
