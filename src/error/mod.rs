//! Error types for the extractor.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::auth::AuthError;
use crate::util::retry::Retryable;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Protocol,
    Configuration,
    Storage,
    Unknown,
}

/// Primary error type for a run.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Another run holds the lock at {}", .0.display())]
    RunLocked(PathBuf),

    #[error("Invalid date window: {0}")]
    InvalidWindow(String),
}

impl BillingError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidWindow(_) => ErrorCategory::Configuration,
            Self::Auth(err) => err.category(),
            Self::Network(err) if err.is_timeout() => ErrorCategory::Timeout,
            Self::Network(err) if err.is_decode() => ErrorCategory::Protocol,
            Self::Network(_) => ErrorCategory::Network,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Protocol(_) | Self::Serialization(_) => ErrorCategory::Protocol,
            Self::Io(_) | Self::Csv(_) | Self::RunLocked(_) => ErrorCategory::Storage,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Whether the failure was caused by the operator rather than the program.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::InvalidWindow(_) | Self::RunLocked(_) => true,
            Self::Auth(err) => err.is_user_error(),
            _ => false,
        }
    }

    /// Process exit code: 1 for user-caused failures, 2 for internal ones.
    pub fn exit_code(&self) -> i32 {
        if self.is_user_error() {
            1
        } else {
            2
        }
    }
}

impl Retryable for BillingError {
    fn is_retryable(&self) -> bool {
        BillingError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for BillingError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_and_rate_limit_errors_are_retryable() {
        assert!(BillingError::api(503, "unavailable").is_retryable());
        assert!(BillingError::RateLimited {
            retry_after_secs: Some(3)
        }
        .is_retryable());
    }

    #[test]
    fn auth_and_protocol_errors_are_not_retryable() {
        assert!(!BillingError::api(401, "expired").is_retryable());
        assert!(!BillingError::Protocol("bad body".into()).is_retryable());
        assert!(!BillingError::Auth(AuthError::Denied).is_retryable());
    }

    #[test]
    fn rate_limit_exposes_retry_after() {
        let err = BillingError::RateLimited {
            retry_after_secs: Some(4),
        };
        assert_eq!(Retryable::retry_after(&err), Some(Duration::from_secs(4)));
        assert_eq!(Retryable::retry_after(&BillingError::api(503, "busy")), None);
    }

    #[test]
    fn unauthorized_status_is_authentication_category() {
        assert_eq!(
            BillingError::api(403, "forbidden").category(),
            ErrorCategory::Authentication
        );
    }

    #[test]
    fn exit_code_distinguishes_user_from_internal_failures() {
        assert_eq!(BillingError::Configuration("missing id".into()).exit_code(), 1);
        assert_eq!(BillingError::Auth(AuthError::Denied).exit_code(), 1);
        assert_eq!(BillingError::RunLocked(PathBuf::from("x.lock")).exit_code(), 1);
        assert_eq!(BillingError::Protocol("garbled".into()).exit_code(), 2);
        assert_eq!(BillingError::api(500, "boom").exit_code(), 2);
    }
}
