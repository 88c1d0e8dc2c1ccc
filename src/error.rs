//! Error types for tirepress-gen
//!
//! This module provides the error taxonomy for the pipeline:
//! - Input rejections ([`ValidationError`]) raised before any external cost is incurred
//! - Gateway failures ([`GatewayError`], [`TransportError`]) for the generation service
//! - Escalation outcomes ([`EscalationError`]) that reach the orchestrator
//! - Persistence failures ([`DatabaseError`])
//! - Machine-readable categories via [`Categorized`] for batch-level aggregation

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::types::Tier;

/// Result type alias for tirepress-gen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tirepress-gen
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "tiers")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A vehicle record was rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Generation gateway error
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Escalation across tiers failed
    #[error("escalation error: {0}")]
    Escalation(#[from] EscalationError),

    /// CSV dataset could not be read
    #[error("dataset error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while building or using the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Stored status does not allow the requested transition
    #[error("invalid status transition for {key}: {from} -> {to}")]
    InvalidTransition {
        /// Natural key of the article
        key: String,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },
}

/// Machine-readable rejection category for an input record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCategory {
    /// A required field is absent or blank
    MissingField,
    /// A pressure value lies outside the plausible band
    OutOfRange,
    /// Model year outside the accepted window
    InvalidYear,
    /// Loaded pressure not above the empty pressure on the same axle
    InconsistentPressure,
    /// Value present but unparsable or unrecognized
    InvalidValue,
}

impl ValidationCategory {
    /// Category string used in logs and batch reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCategory::MissingField => "missing_field",
            ValidationCategory::OutOfRange => "out_of_range",
            ValidationCategory::InvalidYear => "invalid_year",
            ValidationCategory::InconsistentPressure => "inconsistent_pressure",
            ValidationCategory::InvalidValue => "invalid_value",
        }
    }
}

impl std::fmt::Display for ValidationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected vehicle record
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{category}: {message}")]
pub struct ValidationError {
    /// Rejection category
    pub category: ValidationCategory,
    /// Offending field, when a single field is at fault
    pub field: Option<String>,
    /// Human-readable reason, naming the field and value
    pub message: String,
}

impl ValidationError {
    /// Required field absent or blank
    pub fn missing(field: &str) -> Self {
        Self {
            category: ValidationCategory::MissingField,
            field: Some(field.to_string()),
            message: format!("missing required field {field}"),
        }
    }

    /// Pressure outside the plausible band
    pub fn out_of_range(field: &str, value: f64, min: f64, max: f64) -> Self {
        Self {
            category: ValidationCategory::OutOfRange,
            field: Some(field.to_string()),
            message: format!("{field}={value} outside [{min}, {max}]"),
        }
    }

    /// Model year outside the window
    pub fn invalid_year(year: i32, min: i32, max: i32) -> Self {
        Self {
            category: ValidationCategory::InvalidYear,
            field: Some("year".to_string()),
            message: format!("year={year} outside [{min}, {max}]"),
        }
    }

    /// Loaded pressure does not exceed empty pressure
    pub fn inconsistent(axle: &str, loaded: f64, empty: f64) -> Self {
        Self {
            category: ValidationCategory::InconsistentPressure,
            field: Some(format!("loaded_{axle}")),
            message: format!("loaded_{axle}={loaded} is not above empty_{axle}={empty}"),
        }
    }

    /// Unparsable or unrecognized value
    pub fn invalid_value(field: &str, raw: &str) -> Self {
        Self {
            category: ValidationCategory::InvalidValue,
            field: Some(field.to_string()),
            message: format!("{field} has unrecognized value '{raw}'"),
        }
    }
}

/// Transport-level failures talking to the generation service
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Request did not complete within the per-call timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-success status
    #[error("upstream returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Connection could not be established or was reset
    #[error("connection failed: {0}")]
    Connection(String),

    /// Upstream refused with 429; not retried in place
    #[error("upstream throttled the request (retry after {retry_after:?})")]
    Throttled {
        /// Parsed `Retry-After` header, when present
        retry_after: Option<Duration>,
    },
}

/// Errors surfaced by a [`ContentGateway`](crate::gateway::ContentGateway)
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Pacer refused the call; nothing was sent
    #[error("rate limited, next call allowed in {retry_in:?}")]
    RateLimited {
        /// Time until the endpoint accepts another call
        retry_in: Duration,
    },

    /// Transport failed after the bounded retries
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Payload could not be extracted or parsed
    #[error("malformed response: {reason}")]
    Malformed {
        /// What went wrong during extraction
        reason: String,
    },
}

/// Errors returned by [`EscalationStrategy::generate`](crate::escalation::EscalationStrategy::generate)
#[derive(Debug, Clone, Error)]
pub enum EscalationError {
    /// The tier to call is still pacing; caller should defer the item
    #[error("tier {tier} rate limited, retry in {retry_in:?}")]
    RateLimited {
        /// Tier whose endpoint refused
        tier: Tier,
        /// Time until that endpoint accepts another call
        retry_in: Duration,
    },

    /// Transport failure after retries at the given tier
    #[error("transport failure at tier {tier}: {source}")]
    Transport {
        /// Tier that failed
        tier: Tier,
        /// Underlying transport error
        source: TransportError,
    },

    /// Every eligible tier failed semantically
    #[error("exhausted after {attempts} attempts")]
    Exhausted {
        /// Attempts made in this call
        attempts: u32,
    },
}

/// Machine-readable category of an error, used for batch aggregation
pub trait Categorized {
    /// Stable category string (e.g. "out_of_range", "exhausted")
    fn category(&self) -> &str;
}

impl Categorized for ValidationError {
    fn category(&self) -> &str {
        self.category.as_str()
    }
}

impl Categorized for TransportError {
    fn category(&self) -> &str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Status { .. } => "upstream_status",
            TransportError::Connection(_) => "connection",
            TransportError::Throttled { .. } => "throttled",
        }
    }
}

impl Categorized for GatewayError {
    fn category(&self) -> &str {
        match self {
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Transport(_) => "transport",
            GatewayError::Malformed { .. } => "malformed_response",
        }
    }
}

impl Categorized for EscalationError {
    fn category(&self) -> &str {
        match self {
            EscalationError::RateLimited { .. } => "rate_limited",
            EscalationError::Transport { .. } => "transport",
            EscalationError::Exhausted { .. } => "exhausted",
        }
    }
}

impl Categorized for Error {
    fn category(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "persistence",
            Error::Validation(e) => e.category(),
            Error::Gateway(e) => e.category(),
            Error::Escalation(e) => e.category(),
            Error::Csv(_) => "dataset_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_categories_are_snake_case() {
        assert_eq!(ValidationCategory::MissingField.as_str(), "missing_field");
        assert_eq!(ValidationCategory::OutOfRange.as_str(), "out_of_range");
        assert_eq!(ValidationCategory::InvalidYear.as_str(), "invalid_year");
        assert_eq!(
            ValidationCategory::InconsistentPressure.as_str(),
            "inconsistent_pressure"
        );

        let json = serde_json::to_string(&ValidationCategory::InconsistentPressure).unwrap();
        assert_eq!(json, "\"inconsistent_pressure\"");
    }

    #[test]
    fn test_out_of_range_message_names_field_and_value() {
        let err = ValidationError::out_of_range("loaded_front", 0.0, 10.0, 60.0);
        assert_eq!(err.field.as_deref(), Some("loaded_front"));
        assert!(err.message.contains("loaded_front=0"));
        assert_eq!(err.to_string(), "out_of_range: loaded_front=0 outside [10, 60]");
    }

    #[test]
    fn test_crate_error_category_delegates_to_inner() {
        let err: Error = ValidationError::missing("make").into();
        assert_eq!(err.category(), "missing_field");

        let err: Error = EscalationError::Exhausted { attempts: 3 }.into();
        assert_eq!(err.category(), "exhausted");

        let err: Error = DatabaseError::QueryFailed("boom".into()).into();
        assert_eq!(err.category(), "persistence");

        let err: Error = GatewayError::Malformed {
            reason: "no json".into(),
        }
        .into();
        assert_eq!(err.category(), "malformed_response");
    }

    #[test]
    fn test_config_error_carries_key() {
        let err = Error::config("tiers", "at least one tier is required");
        match err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("tiers"));
                assert_eq!(message, "at least one tier is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
