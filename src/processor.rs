//! Batch processing with per-item error isolation and graceful degradation.
//!
//! A failing item increments the processor's [`ErrorBudget`] and is skipped.
//! The budget is checked after each failure: once it is exhausted the rest of
//! the batch is left untouched and the partial result is returned. The count
//! spans the lifetime of the processor, so a later batch on an exhausted
//! processor still handles valid items and stops at its first failure.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigManager, json_kind};
use crate::error::{ItemError, PolicyViolation};

/// Budget used when the configuration does not set `max_errors`.
pub const DEFAULT_MAX_ERRORS: u32 = 5;

/// Failure counter shared by every batch a processor handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBudget {
    pub count: u32,
    pub max: u32,
}

impl ErrorBudget {
    /// Fresh budget with no failures recorded.
    pub fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    /// True once `count` has reached `max`.
    pub fn is_exhausted(&self) -> bool {
        self.count >= self.max
    }
}

/// Decides whether an otherwise valid item should fail anyway.
pub trait FaultInjector {
    fn should_fail(&mut self, item: &Map<String, Value>) -> bool;
}

/// Never injects a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn should_fail(&mut self, _item: &Map<String, Value>) -> bool {
        false
    }
}

/// Fails items at random with probability `rate`.
#[derive(Debug)]
pub struct RandomFaults {
    rate: f64,
    rng: ChaCha8Rng,
}

impl RandomFaults {
    /// Rejects rates outside `[0.0, 1.0]`.
    pub fn new(rate: f64, seed: u64) -> Result<Self, PolicyViolation> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(PolicyViolation::InvalidRate {
                name: "fault_rate",
                value: rate,
            });
        }
        Ok(Self {
            rate,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

impl FaultInjector for RandomFaults {
    fn should_fail(&mut self, _item: &Map<String, Value>) -> bool {
        self.rng.r#gen::<f64>() < self.rate
    }
}

/// Processes batches of loosely typed items against one [`ErrorBudget`].
#[derive(Debug)]
pub struct DataProcessor<F = NoFaults> {
    budget: ErrorBudget,
    faults: F,
    cache: HashMap<String, Value>,
}

/// Reads `max_errors` from `config`, defaulting to [`DEFAULT_MAX_ERRORS`].
pub fn configured_max_errors(config: &ConfigManager) -> u32 {
    config
        .get("max_errors", Some(&Value::from(DEFAULT_MAX_ERRORS)))
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or_else(|| {
            warn!("max_errors is not a valid count, using {DEFAULT_MAX_ERRORS}");
            DEFAULT_MAX_ERRORS
        })
}

impl DataProcessor<NoFaults> {
    /// Processor without fault injection, budgeted from `config`.
    pub fn new(config: &ConfigManager) -> Self {
        Self::with_fault_injector(configured_max_errors(config), NoFaults)
    }
}

impl<F: FaultInjector> DataProcessor<F> {
    /// Processor with an explicit budget and fault strategy.
    pub fn with_fault_injector(max_errors: u32, faults: F) -> Self {
        Self {
            budget: ErrorBudget::new(max_errors),
            faults,
            cache: HashMap::new(),
        }
    }

    /// Snapshot of the budget after every batch so far.
    pub fn error_budget(&self) -> ErrorBudget {
        self.budget
    }

    /// Failures recorded over the processor's lifetime.
    pub fn error_count(&self) -> u32 {
        self.budget.count
    }

    /// Failure count at which a batch stops.
    pub fn max_errors(&self) -> u32 {
        self.budget.max
    }

    /// True once the budget is exhausted; later batches stop at their first failure.
    pub fn is_degraded(&self) -> bool {
        self.budget.is_exhausted()
    }

    /// Processes `items` in order, returning the ones that succeeded.
    pub fn process_all(&mut self, items: &[Value]) -> Vec<Value> {
        let mut processed = Vec::with_capacity(items.len());
        info!("Processing {} data items", items.len());

        for (i, item) in items.iter().enumerate() {
            match self.process_one(item) {
                Ok(out) => {
                    debug!("Successfully processed item {i}");
                    processed.push(out);
                }
                Err(err) => {
                    self.budget.count += 1;
                    warn!(index = i, "Failed to process item {i}: {err}");
                    if self.budget.is_exhausted() {
                        error!(
                            errors = self.budget.count,
                            "Too many errors ({}), stopping processing",
                            self.budget.count
                        );
                        break;
                    }
                }
            }
        }

        let success_rate = if items.is_empty() {
            0.0
        } else {
            processed.len() as f64 / items.len() as f64 * 100.0
        };
        info!(
            "Processed {}/{} items ({success_rate:.1}% success)",
            processed.len(),
            items.len()
        );

        processed
    }

    /// Validates and stamps one item. Does not touch the error budget.
    pub fn process_one(&mut self, item: &Value) -> Result<Value, ItemError> {
        let Value::Object(fields) = item else {
            return Err(ItemError::NotAnObject(json_kind(item)));
        };
        let Some(id) = fields.get("id") else {
            return Err(ItemError::MissingId);
        };
        if self.faults.should_fail(fields) {
            return Err(ItemError::InjectedFault(id.to_string()));
        }

        let mut out = fields.clone();
        out.insert(
            "processed_at".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        out.insert("status".into(), Value::from("processed"));
        Ok(Value::Object(out))
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn cache_insert(&mut self, key: impl Into<String>, value: Value) {
        self.cache.insert(key.into(), value);
    }

    /// Cached value for `key`, if any.
    pub fn cached(&self, key: &str) -> Option<&Value> {
        let hit = self.cache.get(key);
        if hit.is_some() {
            debug!("Cache hit for key: {key}");
        } else {
            debug!("Cache miss for key: {key}");
        }
        hit
    }
}
