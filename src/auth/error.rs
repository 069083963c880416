use thiserror::Error;

use crate::error::ErrorCategory;
use crate::util::retry::Retryable;

/// Errors raised while acquiring, refreshing or persisting credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Device authorization was denied")]
    Denied,
    #[error("Refresh rejected (status {status}): {}", code.as_deref().unwrap_or("unknown"))]
    RefreshRejected { status: u16, code: Option<String> },
    #[error("Unusable credential: {0}")]
    UnusableCredential(String),
    #[error("Device authorization not granted after {attempts} polls")]
    PollLimitExceeded { attempts: u32 },
    #[error("Unexpected device flow error: {0}")]
    UnexpectedPollError(String),
    #[error("Authorization server error (status {status})")]
    Server { status: u16 },
    #[error("Invalid response: {0}")]
    Protocol(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Denied
            | Self::RefreshRejected { .. }
            | Self::UnusableCredential(_)
            | Self::PollLimitExceeded { .. }
            | Self::UnexpectedPollError(_) => ErrorCategory::Authentication,
            Self::Server { .. } => ErrorCategory::Server,
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::Network(_) => ErrorCategory::Network,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::Storage,
        }
    }

    /// Whether the operator can fix this (approve the device, re-authorize).
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Authentication)
    }
}

impl Retryable for AuthError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Protocol(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
