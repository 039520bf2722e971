//! Error types for dirscout core operations.
//!
//! Most degraded conditions (unreadable directories, missing roots, corrupted
//! cache files) are handled where they occur and surface only as log messages
//! and empty results. The variants here are what remains: contract violations
//! by the caller, plus I/O and serialization failures of explicit persistence
//! calls. Higher-level code can wrap these with `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ScoutError
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Core error types for dirscout operations.
#[derive(Error, Debug)]
pub enum ScoutError {
    // === Contract Errors ===
    /// A target set was malformed (empty names, duplicate logical names)
    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },

    /// A logical name was requested that is not part of the configured targets
    #[error("unknown target: {name}")]
    UnknownTarget { name: String },

    /// A manually supplied path failed validation
    #[error("invalid path for {name}: {path}: {reason}")]
    InvalidManualPath {
        name: String,
        path: PathBuf,
        reason: String,
    },

    /// Paths were requested before the locator resolved them
    #[error("locator has not been initialized")]
    NotInitialized,

    /// No search root was given and none could be discovered
    #[error("no search root available: {reason}")]
    RootUnavailable { reason: String },

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// Serialization/deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ScoutError {
    /// Returns true if this error is the caller's fault rather than the
    /// environment's.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ScoutError::InvalidTarget { .. }
                | ScoutError::UnknownTarget { .. }
                | ScoutError::InvalidManualPath { .. }
                | ScoutError::NotInitialized
        )
    }

    /// Create an invalid target error
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        ScoutError::InvalidTarget {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ScoutError {
    fn from(err: serde_json::Error) -> Self {
        ScoutError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violation() {
        let err = ScoutError::invalid_target("empty literal name");
        assert!(err.is_contract_violation());
        assert!(ScoutError::NotInitialized.is_contract_violation());

        let err = ScoutError::ConfigError {
            reason: "expected value".to_string(),
        };
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_environment_errors_are_not_contract_violations() {
        let err: ScoutError = std::io::Error::new(std::io::ErrorKind::Other, "share offline").into();
        assert!(!err.is_contract_violation());

        let err: ScoutError = serde_json::from_str::<u32>("x").unwrap_err().into();
        assert!(matches!(err, ScoutError::Serialization(_)));
        assert!(!err.is_contract_violation());
    }
}
