//! Error types for the protection pipeline
//!
//! Every failure a request can hit, from validation through staging, rights
//! resolution and the engine workflow, is one [`ProtectionError`]. The
//! transport maps it to a response with [`ProtectionError::status_code`] and
//! [`ProtectionError::error_code`].

use docrights_model::ModelError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Protection pipeline errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtectionError {
    /// Missing or malformed request field, disallowed extension, traversal attempt
    #[error("Validation error: {0}")]
    Validation(String),

    /// The resolved plan cannot satisfy the requested operation
    #[error("No valid user permissions were provided: {0}")]
    NoValidPermissions(String),

    /// Opening or mutating the engine handle failed
    #[error("Engine handle error: {0}")]
    EngineHandle(String),

    /// Committing through the engine failed
    #[error("Engine commit error: {0}")]
    EngineCommit(String),

    /// Staging read/write failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Output path escaped the configured output root
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// The engine workflow did not finish within the deadline
    #[error("Protection workflow timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for protection operations.
pub type ProtectionResult<T> = Result<T, ProtectionError>;

/// Tag identifying which kind of failure ended a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    NoValidPermissions,
    EngineHandle,
    EngineCommit,
    Io,
    InvalidOutputPath,
    Timeout,
    Config,
    Internal,
}

impl ProtectionError {
    /// The failure tag for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            ProtectionError::Validation(_) => FailureKind::Validation,
            ProtectionError::NoValidPermissions(_) => FailureKind::NoValidPermissions,
            ProtectionError::EngineHandle(_) => FailureKind::EngineHandle,
            ProtectionError::EngineCommit(_) => FailureKind::EngineCommit,
            ProtectionError::Io(_) => FailureKind::Io,
            ProtectionError::InvalidOutputPath(_) => FailureKind::InvalidOutputPath,
            ProtectionError::Timeout(_) => FailureKind::Timeout,
            ProtectionError::Config(_) => FailureKind::Config,
            ProtectionError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Check if this error was caused by the caller.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ProtectionError::Validation(_) | ProtectionError::NoValidPermissions(_)
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ProtectionError::Validation(_) | ProtectionError::NoValidPermissions(_) => 400,
            ProtectionError::EngineHandle(_) | ProtectionError::EngineCommit(_) => 502,
            ProtectionError::Timeout(_) => 504,
            ProtectionError::Io(_)
            | ProtectionError::InvalidOutputPath(_)
            | ProtectionError::Config(_)
            | ProtectionError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtectionError::Validation(_) => "VALIDATION_ERROR",
            ProtectionError::NoValidPermissions(_) => "NO_VALID_PERMISSIONS",
            ProtectionError::EngineHandle(_) => "ENGINE_HANDLE_ERROR",
            ProtectionError::EngineCommit(_) => "ENGINE_COMMIT_ERROR",
            ProtectionError::Io(_) => "IO_ERROR",
            ProtectionError::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            ProtectionError::Timeout(_) => "TIMEOUT",
            ProtectionError::Config(_) => "CONFIG_ERROR",
            ProtectionError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for ProtectionError {
    fn from(err: std::io::Error) -> Self {
        ProtectionError::Io(err.to_string())
    }
}

impl From<ModelError> for ProtectionError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::EmptyCapabilitySet(_) | ModelError::EmptyPrincipalSet => {
                ProtectionError::NoValidPermissions(err.to_string())
            }
            other => ProtectionError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ProtectionError::Validation("x".into()).status_code(), 400);
        assert_eq!(ProtectionError::NoValidPermissions("x".into()).status_code(), 400);
        assert_eq!(ProtectionError::EngineCommit("x".into()).status_code(), 502);
        assert_eq!(ProtectionError::Timeout(Duration::from_secs(5)).status_code(), 504);
        assert_eq!(ProtectionError::InvalidOutputPath("x".into()).status_code(), 500);
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            ProtectionError::EngineHandle("x".into()).kind(),
            FailureKind::EngineHandle
        );
        assert_eq!(ProtectionError::Timeout(Duration::from_secs(1)).kind(), FailureKind::Timeout);
    }

    #[test]
    fn test_model_errors_convert() {
        let err: ProtectionError = ModelError::EmptyCapabilitySet("a@x.com".into()).into();
        assert!(matches!(err, ProtectionError::NoValidPermissions(_)));

        let err: ProtectionError = ModelError::BlankPrincipal.into();
        assert!(matches!(err, ProtectionError::Validation(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ProtectionError = io.into();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
