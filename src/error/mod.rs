//! Error types for lms-session.

use thiserror::Error;

use crate::auth::AuthError;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Network,
    Storage,
    Configuration,
    Usage,
}

/// Primary error type for session operations outside the scheduler.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Auth(AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl SessionError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Io(_) => ErrorCategory::Storage,
            Self::InvalidArgument(_) => ErrorCategory::Usage,
            Self::Auth(auth) => match auth {
                AuthError::Network(_)
                | AuthError::Server { .. }
                | AuthError::RateLimited { .. }
                | AuthError::InvalidResponse(_) => ErrorCategory::Network,
                AuthError::Io(_) | AuthError::Serialization(_) | AuthError::Storage(_) => {
                    ErrorCategory::Storage
                }
                AuthError::NotLoggedIn | AuthError::ExpiredOrInvalidGrant => {
                    ErrorCategory::Authentication
                }
            },
        }
    }

    /// Whether the user has to sign in again to recover.
    pub fn requires_login(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SessionError>;
