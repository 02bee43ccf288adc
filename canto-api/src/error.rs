//! Error Types for the Canto API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use canto_core::{CantoError, ConfigError, StoreError, UpstreamError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of every 503 response: a bare JSON string clients match on.
pub const NOT_DONE_YET_BODY: &str = "not done yet";

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Path segments do not form a valid key
    InvalidKey,

    /// Request body is missing or is not the expected JSON
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    // ========================================================================
    // Upstream Errors (404, 502, 503)
    // ========================================================================
    /// The document store has no document for the key
    UpstreamNotFound,

    /// The document store could not be reached or returned an error
    UpstreamUnavailable,

    /// The document store answered with something that is not a usable document
    UpstreamInvalid,

    // ========================================================================
    // Server Errors (500, 504)
    // ========================================================================
    /// Histogram store operation failed
    StoreUnavailable,

    /// Internal server error
    InternalError,

    /// Populate or ingest pass exceeded its time limit
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidKey | ErrorCode::InvalidInput | ErrorCode::MissingField => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::UpstreamNotFound => StatusCode::NOT_FOUND,
            ErrorCode::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::UpstreamInvalid => StatusCode::BAD_GATEWAY,

            ErrorCode::StoreUnavailable | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidKey => "Invalid key",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::UpstreamNotFound => "Source document not found",
            ErrorCode::UpstreamUnavailable => NOT_DONE_YET_BODY,
            ErrorCode::UpstreamInvalid => "Source document is not usable",
            ErrorCode::StoreUnavailable => "Histogram store operation failed",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (key, reason, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_key(key: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidKey, format!("Invalid key '{}': {}", key, reason))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.code == ErrorCode::UpstreamUnavailable {
            // Only the bare string goes on the wire; the rest is logged.
            tracing::warn!(
                code = %self.code,
                details = ?self.details,
                "Document store unavailable"
            );
            return (status, Json(NOT_DONE_YET_BODY)).into_response();
        }
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

/// Convert from CantoError to ApiError.
///
/// Store failures are reported without backend detail; the full error is
/// logged where it happened.
impl From<CantoError> for ApiError {
    fn from(err: CantoError) -> Self {
        match err {
            CantoError::Store(store) => {
                let code = ErrorCode::StoreUnavailable;
                let message = match store {
                    StoreError::Corrupt { .. } => "Stored histogram is corrupt",
                    StoreError::LockPoisoned => "Histogram store lock poisoned",
                    StoreError::Unavailable { .. } | StoreError::ConnectionFailed { .. } => {
                        code.default_message()
                    }
                };
                ApiError::new(code, message)
            }
            CantoError::Upstream(upstream) => match upstream {
                UpstreamError::NotFound { key } => ApiError::from_code(ErrorCode::UpstreamNotFound)
                    .with_details(serde_json::json!({ "key": key })),
                UpstreamError::Unavailable { key, reason } => {
                    ApiError::from_code(ErrorCode::UpstreamUnavailable)
                        .with_details(serde_json::json!({ "key": key, "reason": reason }))
                }
                UpstreamError::TokenRejected { reason } => {
                    ApiError::from_code(ErrorCode::UpstreamUnavailable)
                        .with_details(serde_json::json!({ "reason": reason }))
                }
                UpstreamError::InvalidDocument { key, reason } => {
                    ApiError::from_code(ErrorCode::UpstreamInvalid)
                        .with_details(serde_json::json!({ "key": key, "reason": reason }))
                }
            },
            CantoError::Validation(validation) => match validation {
                ValidationError::InvalidKey { key, reason } => ApiError::invalid_key(key, reason),
                ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
                ValidationError::InvalidValue { field, reason } => {
                    ApiError::invalid_input(format!("Invalid value for {}: {}", field, reason))
                }
            },
            CantoError::Config(config) => {
                ApiError::internal_error(format!("Configuration error: {}", config))
            }
            CantoError::Timeout { key, elapsed } => ApiError::from_code(ErrorCode::Timeout)
                .with_details(serde_json::json!({
                    "key": key,
                    "elapsed_ms": elapsed.as_millis() as u64,
                })),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        CantoError::from(err).into()
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        CantoError::from(err).into()
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!(error = %err, "Rejected JSON body");
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
