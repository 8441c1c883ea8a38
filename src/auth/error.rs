use thiserror::Error;

use crate::error::SessionError;

/// Normalized authentication errors for the LMS session layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Expired or invalid grant")]
    ExpiredOrInvalidGrant,
    #[error("Rate limited")]
    RateLimited { retry_after_ms: Option<u64> },
    #[error("Server error (status {status})")]
    Server { status: u16 },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Token storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Whether a refresh that failed with this error is worth repeating.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_)
        )
    }

    /// Map a non-success HTTP status from the auth endpoints.
    pub fn from_status(status: u16, retry_after_ms: Option<u64>) -> Self {
        match status {
            400 | 401 | 403 => Self::ExpiredOrInvalidGrant,
            429 => Self::RateLimited { retry_after_ms },
            500..=599 => Self::Server { status },
            other => Self::InvalidResponse(format!("unexpected status {other}")),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
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

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
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

impl From<AuthError> for SessionError {
    fn from(error: AuthError) -> Self {
        SessionError::Auth(error)
    }
}
