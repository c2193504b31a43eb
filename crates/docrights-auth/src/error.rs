//! Error types for token acquisition
//!
//! This module defines the errors raised while acquiring, caching or
//! inspecting bearer tokens for the protection engine and the mail service.

use thiserror::Error;

/// Authentication error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be parsed
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The identity provider rejected or failed the token request
    #[error("OAuth error: {0}")]
    OAuthError(String),

    /// The identity provider refused the client credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration error (bad authority URL, missing client id, ...)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, AuthError::Internal(_) | AuthError::ConfigError(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidToken(_) | AuthError::Unauthorized(_) => 401,
            AuthError::OAuthError(_) => 502,
            AuthError::ConfigError(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::OAuthError(_) => "OAUTH_ERROR",
            AuthError::Unauthorized(_) => "UNAUTHORIZED",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
