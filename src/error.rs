//! Error taxonomy for the recovery components.
//!
//! Each failure family is a closed enum. Whether a family is retried,
//! recovered locally or surfaced to the caller is decided by the component
//! that owns it, not by the error type itself.

use std::path::PathBuf;

use thiserror::Error;

/// Transient failure from a (simulated) remote call. Retried by
/// [`RetryExecutor`](crate::retry::RetryExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("Simulated network failure")]
    Simulated,
}

/// Why a configuration file could not be used. Always recovered by
/// [`ConfigManager::load`](crate::config::ConfigManager::load).
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied reading {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("invalid configuration in {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("unexpected error loading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigLoadError {
    /// Short label used in logs and in [`ConfigSource::Defaults`](crate::config::ConfigSource).
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigLoadError::NotFound(_) => "not_found",
            ConfigLoadError::PermissionDenied(_) => "permission_denied",
            ConfigLoadError::Malformed { .. } => "malformed",
            ConfigLoadError::Io { .. } => "io",
        }
    }
}

/// Per-item validation failure inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("expected an object, got {0}")]
    NotAnObject(&'static str),

    #[error("item missing required 'id' field")]
    MissingId,

    #[error("random processing failure for item {0}")]
    InjectedFault(String),
}

/// A caller handed a component parameters that break its contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyViolation {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("max_delay ({max_ms}ms) must not be below base_delay ({base_ms}ms)")]
    MaxDelayBelowBase { base_ms: u128, max_ms: u128 },

    #[error("{name} must be within [0.0, 1.0], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
}

/// Failure to acquire a file handle in [`safe_file`](crate::safe_file).
#[derive(Debug, Error)]
pub enum FileAccessError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied accessing: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("unexpected error with file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileAccessError {
    pub fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FileAccessError::NotFound(path),
            std::io::ErrorKind::PermissionDenied => FileAccessError::PermissionDenied(path),
            _ => FileAccessError::Io { path, source: err },
        }
    }
}

impl From<FileAccessError> for ConfigLoadError {
    fn from(err: FileAccessError) -> Self {
        match err {
            FileAccessError::NotFound(path) => ConfigLoadError::NotFound(path),
            FileAccessError::PermissionDenied(path) => ConfigLoadError::PermissionDenied(path),
            FileAccessError::Io { path, source } => ConfigLoadError::Io { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_display() {
        assert_eq!(NetworkError::Simulated.to_string(), "Simulated network failure");
    }

    #[test]
    fn item_error_display() {
        assert_eq!(
            ItemError::NotAnObject("string").to_string(),
            "expected an object, got string"
        );
        assert_eq!(
            ItemError::MissingId.to_string(),
            "item missing required 'id' field"
        );
    }

    #[test]
    fn file_access_error_classifies_io_kinds() {
        let path = PathBuf::from("/tmp/x");
        let err = FileAccessError::from_io(
            path.clone(),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, FileAccessError::NotFound(_)));

        let err = FileAccessError::from_io(
            path.clone(),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, FileAccessError::PermissionDenied(_)));

        let err = FileAccessError::from_io(path, std::io::Error::other("disk on fire"));
        assert!(matches!(err, FileAccessError::Io { .. }));
    }

    #[test]
    fn config_load_error_kind_follows_file_error() {
        let err: ConfigLoadError = FileAccessError::NotFound(PathBuf::from("a.json")).into();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "configuration file a.json not found");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NetworkError>();
        assert_send_sync::<ConfigLoadError>();
        assert_send_sync::<ItemError>();
        assert_send_sync::<PolicyViolation>();
    }
}
