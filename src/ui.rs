//! Terminal output: spinners and coloured summaries.
//!
//! Uses `indicatif` for the progress spinner and `console` for styling.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use resilience::config::{ConfigMap, ConfigSource, ValidationIssue};
use resilience::network::{UserRecord, UserStatus};
use resilience::processor::ErrorBudget;

/// Spinner shown while a blocking operation runs, plus styled reporting.
pub struct Progress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl Progress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Stops the spinner without printing anything.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    pub fn report_user(&self, user: &UserRecord) {
        self.finish();
        match user.status {
            UserStatus::Active => {
                println!("  {} Fetched user {}", self.green.apply_to("✓"), user.id);
            }
            UserStatus::Fallback => {
                println!(
                    "  {} Network unavailable, serving fallback for user {}",
                    self.yellow.apply_to("↻"),
                    user.id
                );
            }
        }
        print_json(user);
    }

    pub fn report_batch(&self, processed: &[serde_json::Value], total: usize, budget: ErrorBudget) {
        self.finish();
        let marker = if budget.is_exhausted() {
            self.red.apply_to("✗")
        } else if budget.count > 0 {
            self.yellow.apply_to("↻")
        } else {
            self.green.apply_to("✓")
        };
        println!(
            "  {marker} Processed {}/{total} items, errors {}/{}",
            processed.len(),
            budget.count,
            budget.max
        );
        if budget.is_exhausted() {
            println!("  {}", self.red.apply_to("Error budget exhausted, batch degraded"));
        }
        print_json(processed);
    }
}

/// Prints the effective configuration and any validation issues.
pub fn report_config(source: &ConfigSource, values: &ConfigMap, issues: &[ValidationIssue]) {
    let dim = Style::new().dim();
    let source = match source {
        ConfigSource::File(path) => format!("file {}", path.display()),
        ConfigSource::Defaults(kind) => format!("defaults ({kind})"),
        ConfigSource::Memory => "memory".to_string(),
    };
    println!("{}", dim.apply_to(format!("─── Configuration from {source} ───")));
    print_json(values);

    if issues.is_empty() {
        println!("  {} No configuration issues", Style::new().green().apply_to("✓"));
    } else {
        for issue in issues {
            println!("  {} {issue}", Style::new().yellow().apply_to("!"));
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
