//! Configuration loaded from a JSON or TOML file with fallback to defaults.
//!
//! [`ConfigManager::load`] never fails: a missing, unreadable or malformed
//! file is logged and replaced by the built-in [`default_values`]. Lookups go
//! through three tiers: the loaded value, then a caller-supplied fallback,
//! then the defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::ConfigLoadError;
use crate::safe_file;

/// A configuration value. Scalars in practice; nested values pass through.
pub type ConfigValue = Value;

/// Key/value mapping in file order.
pub type ConfigMap = Map<String, ConfigValue>;

/// Built-in fallback configuration.
pub fn default_values() -> ConfigMap {
    let mut defaults = ConfigMap::new();
    defaults.insert("database_url".into(), Value::from("sqlite:///default.db"));
    defaults.insert("cache_size".into(), Value::from(100));
    defaults.insert("timeout".into(), Value::from(30));
    defaults.insert("debug".into(), Value::from(false));
    defaults
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Defaults were used because loading failed with the given kind.
    Defaults(&'static str),
    Memory,
}

/// One configuration inconsistency. Reported, never enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub key: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn new(key: &'static str, requirement: &str) -> Self {
        Self {
            key,
            message: format!("{key} must be {requirement}"),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Loaded configuration layered over the built-in defaults.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    values: ConfigMap,
    defaults: ConfigMap,
    source: ConfigSource,
}

impl ConfigManager {
    /// Loads `path`, falling back to defaults on any failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(manager) => manager,
            Err(err) => {
                match &err {
                    ConfigLoadError::NotFound(_) => {
                        warn!("Configuration file {} not found, using defaults", path.display())
                    }
                    _ => {
                        error!(kind = err.kind(), "{err}");
                        warn!("Using default configuration");
                    }
                }
                let defaults = default_values();
                Self {
                    values: defaults.clone(),
                    defaults,
                    source: ConfigSource::Defaults(err.kind()),
                }
            }
        }
    }

    /// Loads `path`, reporting why it could not be used.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let contents = safe_file::read_to_string(path)?;
        let values = parse(path, &contents)?;
        info!("Configuration loaded from {}", path.display());

        let manager = Self {
            values,
            defaults: default_values(),
            source: ConfigSource::File(path.to_path_buf()),
        };

        let issues = manager.validate();
        if !issues.is_empty() {
            let joined: Vec<String> = issues.iter().map(ToString::to_string).collect();
            warn!("Configuration issues found: {}", joined.join("; "));
        }

        Ok(manager)
    }

    /// Builds a manager over an in-memory mapping.
    pub fn from_values(values: ConfigMap) -> Self {
        Self {
            values,
            defaults: default_values(),
            source: ConfigSource::Memory,
        }
    }

    /// Where the loaded values came from.
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Loaded values, without defaults merged in.
    pub fn values(&self) -> &ConfigMap {
        &self.values
    }

    /// Loaded values overlaid on the defaults.
    pub fn effective(&self) -> ConfigMap {
        let mut merged = self.defaults.clone();
        for (key, value) in &self.values {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Resolves `key`: loaded value, then `fallback` if supplied, then defaults.
    ///
    /// `Some(&Value::Null)` is a supplied fallback and is returned as such.
    pub fn get(&self, key: &str, fallback: Option<&ConfigValue>) -> Option<ConfigValue> {
        if let Some(value) = self.values.get(key) {
            return Some(value.clone());
        }
        if let Some(fallback) = fallback {
            debug!("Using provided fallback for '{key}': {fallback}");
            return Some(fallback.clone());
        }
        if let Some(default) = self.defaults.get(key) {
            debug!("Using default value for '{key}': {default}");
            return Some(default.clone());
        }
        warn!("No value or default found for key '{key}'");
        None
    }

    /// [`get`](Self::get) without a fallback, as a string. `None` when the
    /// key is unresolved or holds another type; the same goes for the other
    /// typed getters.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key, None)?.as_str().map(str::to_owned)
    }

    /// Non-negative integers only.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key, None)?.as_u64()
    }

    /// Any JSON number.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key, None)?.as_f64()
    }

    /// Booleans only; `"true"` strings are not coerced.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key, None)?.as_bool()
    }

    /// Checks the known keys of the loaded values. Absent and unknown keys pass.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if let Some(cache_size) = self.present("cache_size") {
            let positive_int = cache_size.as_i64().is_some_and(|n| n >= 1)
                || cache_size.as_u64().is_some_and(|n| n >= 1);
            if !positive_int {
                issues.push(ValidationIssue::new("cache_size", "a positive integer"));
            }
        }

        if let Some(timeout) = self.present("timeout")
            && !timeout.as_f64().is_some_and(|t| t > 0.0)
        {
            issues.push(ValidationIssue::new("timeout", "a positive number"));
        }

        if let Some(debug) = self.present("debug")
            && !debug.is_boolean()
        {
            issues.push(ValidationIssue::new("debug", "a boolean"));
        }

        issues
    }

    // An explicit null counts as absent, matching a key that was never set.
    fn present(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key).filter(|v| !v.is_null())
    }
}

fn parse(path: &Path, contents: &str) -> Result<ConfigMap, ConfigLoadError> {
    let malformed = |message: String| ConfigLoadError::Malformed {
        path: path.to_path_buf(),
        message,
    };

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let value = if is_toml {
        let table: toml::Table = toml::from_str(contents).map_err(|e| malformed(e.to_string()))?;
        serde_json::to_value(table).map_err(|e| malformed(e.to_string()))?
    } else {
        serde_json::from_str::<Value>(contents).map_err(|e| malformed(e.to_string()))?
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(malformed(format!(
            "expected a top-level object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Name of a JSON value's kind, for messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
