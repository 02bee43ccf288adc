//! Error types for Canto operations

use std::time::Duration;
use thiserror::Error;

/// Histogram store errors.
///
/// None of these mean "key absent"; an absent key is a successful
/// `exists() == false` or an empty `read_all()`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable during {operation} on {key}: {reason}")]
    Unavailable {
        operation: &'static str,
        key: String,
        reason: String,
    },

    #[error("Corrupt histogram entry {key}[{field}]: {reason}")]
    Corrupt {
        key: String,
        field: String,
        reason: String,
    },

    #[error("Store connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Build an `Unavailable` error from any displayable backend failure.
    pub fn unavailable(operation: &'static str, key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            operation,
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Upstream document collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Source document not found for {key}")]
    NotFound { key: String },

    #[error("Upstream unavailable for {key}: {reason}")]
    Unavailable { key: String, reason: String },

    #[error("Invalid source document for {key}: {reason}")]
    InvalidDocument { key: String, reason: String },

    #[error("Token request failed: {reason}")]
    TokenRejected { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid key {key}: {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Master error type for all Canto errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CantoError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Populate pass for {key} timed out after {elapsed:?}")]
    Timeout { key: String, elapsed: Duration },
}

impl CantoError {
    /// Whether retrying the same call could succeed.
    ///
    /// Only transport-level failures qualify; a missing document or a
    /// malformed key will fail the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CantoError::Store(StoreError::Unavailable { .. })
                | CantoError::Store(StoreError::ConnectionFailed { .. })
                | CantoError::Upstream(UpstreamError::Unavailable { .. })
        )
    }
}

/// Result type alias for Canto operations.
pub type CantoResult<T> = Result<T, CantoError>;

// =============================================================================
// TESTS
// =============================================================================
