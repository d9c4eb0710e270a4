//! Error types for the Zen integration core.
//!
//! Two layers live here: [`ErrorCode`], the closed taxonomy every result and
//! log line is projected onto, and the Rust error enums ([`ZenError`],
//! [`PluginError`]) that carry those codes through `?`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error taxonomy shared by the orchestrator, plugins and the data mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    CircuitBreakerOpen,
    RateLimited,
    ContextCancelled,
    AuthenticationFailed,
    NotFound,
    InvalidRequest,
    ValidationFailed,
    TransformFailed,
    RequiredFieldMissing,
    NetworkError,
    TimeoutError,
    ServerError,
    ServiceUnavailable,
    InternalError,
    Unknown,
}

impl ErrorCode {
    /// Codes the orchestrator retries even when the policy does not list them
    pub const DEFAULT_RETRYABLE: [ErrorCode; 5] = [
        ErrorCode::RateLimited,
        ErrorCode::NetworkError,
        ErrorCode::TimeoutError,
        ErrorCode::ServerError,
        ErrorCode::ServiceUnavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            Self::RateLimited => "RATE_LIMITED",
            Self::ContextCancelled => "CONTEXT_CANCELLED",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::TransformFailed => "TRANSFORM_FAILED",
            Self::RequiredFieldMissing => "REQUIRED_FIELD_MISSING",
            Self::NetworkError => "NETWORK_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_default_retryable(&self) -> bool {
        Self::DEFAULT_RETRYABLE.contains(self)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CIRCUIT_BREAKER_OPEN" => Ok(Self::CircuitBreakerOpen),
            "RATE_LIMITED" => Ok(Self::RateLimited),
            "CONTEXT_CANCELLED" => Ok(Self::ContextCancelled),
            "AUTHENTICATION_FAILED" => Ok(Self::AuthenticationFailed),
            "NOT_FOUND" => Ok(Self::NotFound),
            "INVALID_REQUEST" => Ok(Self::InvalidRequest),
            "VALIDATION_FAILED" => Ok(Self::ValidationFailed),
            "TRANSFORM_FAILED" => Ok(Self::TransformFailed),
            "REQUIRED_FIELD_MISSING" => Ok(Self::RequiredFieldMissing),
            "NETWORK_ERROR" => Ok(Self::NetworkError),
            "TIMEOUT_ERROR" => Ok(Self::TimeoutError),
            "SERVER_ERROR" => Ok(Self::ServerError),
            "SERVICE_UNAVAILABLE" => Ok(Self::ServiceUnavailable),
            "INTERNAL_ERROR" => Ok(Self::InternalError),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(format!("Invalid error code: {s}")),
        }
    }
}

/// Error value returned by plugin operations
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct PluginError {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    pub status_code: Option<u16>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl PluginError {
    /// Create an error whose retryability follows the default retryable set
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_default_retryable(),
            status_code: None,
            details: None,
        }
    }

    /// Translate an HTTP status from a vendor API into the error taxonomy
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let (code, retryable) = match status {
            400 => (ErrorCode::InvalidRequest, false),
            401 | 403 => (ErrorCode::AuthenticationFailed, false),
            404 => (ErrorCode::NotFound, false),
            429 => (ErrorCode::RateLimited, true),
            500 | 502 | 503 | 504 => (ErrorCode::InternalError, true),
            _ => (ErrorCode::Unknown, false),
        };

        Self {
            code,
            message: message.into(),
            retryable,
            status_code: Some(status),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZenError {
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),
    #[error("Circuit breaker is open for {component}")]
    CircuitBreakerOpen { component: String },
    #[error("Rate limit exceeded for {component}")]
    RateLimited { component: String },
    #[error("Context cancelled: {0}")]
    Cancelled(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Unsupported operation type: {0}")]
    UnsupportedOperation(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Transaction error: {0}")]
    TransactionError(String),
    #[error("Compensation error for operation {operation_id}: {reason}")]
    CompensationError {
        operation_id: String,
        reason: String,
    },
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
    #[error("Mapping error: {0}")]
    MappingError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ZenError {
    /// Project this error onto the shared taxonomy
    pub fn code(&self) -> ErrorCode {
        match self {
            ZenError::Plugin(e) => e.code,
            ZenError::PluginNotFound(_) => ErrorCode::NotFound,
            ZenError::CircuitBreakerOpen { .. } => ErrorCode::CircuitBreakerOpen,
            ZenError::RateLimited { .. } => ErrorCode::RateLimited,
            ZenError::Cancelled(_) => ErrorCode::ContextCancelled,
            ZenError::Timeout(_) => ErrorCode::TimeoutError,
            ZenError::UnsupportedOperation(_) | ZenError::InvalidRequest(_) => {
                ErrorCode::InvalidRequest
            }
            ZenError::AuthenticationError(_) => ErrorCode::AuthenticationFailed,
            ZenError::MappingError(_) => ErrorCode::TransformFailed,
            ZenError::ValidationError(_) => ErrorCode::ValidationFailed,
            ZenError::ConfigurationError(_) => ErrorCode::InvalidRequest,
            ZenError::TransactionError(_)
            | ZenError::CompensationError { .. }
            | ZenError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the error itself claims a retry could succeed
    pub fn is_flagged_retryable(&self) -> bool {
        match self {
            ZenError::Plugin(e) => e.retryable,
            ZenError::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ZenError {
    fn from(error: serde_json::Error) -> Self {
        ZenError::MappingError(format!("JSON serialization error: {error}"))
    }
}

impl From<config::ConfigError> for ZenError {
    fn from(error: config::ConfigError) -> Self {
        ZenError::ConfigurationError(error.to_string())
    }
}

impl From<reqwest::Error> for ZenError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            ZenError::Plugin(PluginError::from_http_status(
                status.as_u16(),
                error.to_string(),
            ))
        } else if error.is_timeout() {
            ZenError::Timeout(error.to_string())
        } else {
            ZenError::Plugin(PluginError::network(error.to_string()))
        }
    }
}

pub type ZenResult<T> = std::result::Result<T, ZenError>;
pub type PluginResult<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_taxonomy() {
        let rate = PluginError::from_http_status(429, "slow down");
        assert_eq!(rate.code, ErrorCode::RateLimited);
        assert!(rate.retryable);
        assert_eq!(rate.status_code, Some(429));

        let missing = PluginError::from_http_status(404, "gone");
        assert_eq!(missing.code, ErrorCode::NotFound);
        assert!(!missing.retryable);

        for status in [401, 403] {
            let auth = PluginError::from_http_status(status, "denied");
            assert_eq!(auth.code, ErrorCode::AuthenticationFailed);
            assert!(!auth.retryable);
        }

        for status in [500, 502, 503, 504] {
            let server = PluginError::from_http_status(status, "boom");
            assert_eq!(server.code, ErrorCode::InternalError);
            assert!(server.retryable);
        }

        let odd = PluginError::from_http_status(418, "teapot");
        assert_eq!(odd.code, ErrorCode::Unknown);
        assert!(!odd.retryable);
    }

    #[test]
    fn test_error_code_string_roundtrip() {
        assert_eq!(ErrorCode::CircuitBreakerOpen.as_str(), "CIRCUIT_BREAKER_OPEN");
        assert_eq!(
            "SERVICE_UNAVAILABLE".parse::<ErrorCode>().unwrap(),
            ErrorCode::ServiceUnavailable
        );
        assert!("NOPE".parse::<ErrorCode>().is_err());

        let json = serde_json::to_string(&ErrorCode::RequiredFieldMissing).unwrap();
        assert_eq!(json, "\"REQUIRED_FIELD_MISSING\"");
    }

    #[test]
    fn test_zen_error_codes() {
        let err: ZenError = PluginError::not_found("task 1").into();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(!err.is_flagged_retryable());

        let err = ZenError::CircuitBreakerOpen {
            component: "jira".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::CircuitBreakerOpen);
        assert_eq!(err.to_string(), "Circuit breaker is open for jira");
    }
}
