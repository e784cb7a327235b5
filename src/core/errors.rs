//! RDS-prefixed error types with structured error codes.
//!
//! Only conditions the caller has to act on are errors. Malformed fields, unknown
//! patch keys and missing documents are absorbed by the store and reported as
//! [`crate::store::record::Anomaly`] values instead.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, RdsError>;

/// Top-level error type for the radio device store.
#[derive(Debug, Error)]
pub enum RdsError {
    #[error("[RDS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[RDS-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[RDS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[RDS-1101] invalid device id {id:?}: {reason}")]
    InvalidDeviceId { id: String, reason: &'static str },

    #[error("[RDS-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[RDS-3001] storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[RDS-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[RDS-3003] failed to lock device {device}: {details}")]
    LockFailed { device: String, details: String },

    #[error("[RDS-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl RdsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "RDS-1001",
            Self::MissingConfig { .. } => "RDS-1002",
            Self::ConfigParse { .. } => "RDS-1003",
            Self::InvalidDeviceId { .. } => "RDS-1101",
            Self::Serialization { .. } => "RDS-2101",
            Self::StorageUnavailable { .. } => "RDS-3001",
            Self::Io { .. } => "RDS-3002",
            Self::LockFailed { .. } => "RDS-3003",
            Self::Runtime { .. } => "RDS-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// The store itself never retries; this is advice for callers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::LockFailed { .. } | Self::Runtime { .. }
        )
    }

    /// Whether the error came from the write path of a device document.
    #[must_use]
    pub const fn is_storage_failure(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a failed document write.
    #[must_use]
    pub fn storage(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::StorageUnavailable {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for RdsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for RdsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, "test")
    }

    #[test]
    fn error_codes_are_unique() {
        let errors: Vec<RdsError> = vec![
            RdsError::InvalidConfig {
                details: String::new(),
            },
            RdsError::MissingConfig {
                path: PathBuf::new(),
            },
            RdsError::ConfigParse {
                context: "",
                details: String::new(),
            },
            RdsError::InvalidDeviceId {
                id: String::new(),
                reason: "",
            },
            RdsError::Serialization {
                context: "",
                details: String::new(),
            },
            RdsError::StorageUnavailable {
                path: PathBuf::new(),
                source: io_err(),
            },
            RdsError::Io {
                path: PathBuf::new(),
                source: io_err(),
            },
            RdsError::LockFailed {
                device: String::new(),
                details: String::new(),
            },
            RdsError::Runtime {
                details: String::new(),
            },
        ];

        let codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
        for code in &codes {
            assert!(code.starts_with("RDS-"), "code {code} must start with RDS-");
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = RdsError::InvalidDeviceId {
            id: "../etc".to_string(),
            reason: "contains path characters",
        };
        let msg = err.to_string();
        assert!(msg.contains("RDS-1101"), "display should contain code: {msg}");
        assert!(msg.contains("../etc"), "display should contain id: {msg}");
    }

    #[test]
    fn only_write_failures_are_storage_failures() {
        assert!(RdsError::storage("/data/radio1.status", io_err()).is_storage_failure());
        assert!(!RdsError::io("/data", io_err()).is_storage_failure());
        assert!(
            !RdsError::InvalidConfig {
                details: String::new()
            }
            .is_storage_failure()
        );
    }

    #[test]
    fn storage_failures_are_not_retryable() {
        assert!(!RdsError::storage("/data/x.alert", io_err()).is_retryable());
        assert!(RdsError::io("/data", io_err()).is_retryable());
        assert!(
            RdsError::LockFailed {
                device: "radio1".to_string(),
                details: "EINTR".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = RdsError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "RDS-3002");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: RdsError = json_err.into();
        assert_eq!(err.code(), "RDS-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: RdsError = toml_err.into();
        assert_eq!(err.code(), "RDS-1003");
    }
}
