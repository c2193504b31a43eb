//! Error types for the rights model.

use thiserror::Error;

/// Errors raised while constructing grants, plans or rights-code tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A grant was built without any principal
    #[error("Grant has no principals")]
    EmptyPrincipalSet,

    /// A principal identifier was empty or whitespace
    #[error("Principal identifier is blank")]
    BlankPrincipal,

    /// A grant was built without any capability
    #[error("Grant for {0} has no capabilities")]
    EmptyCapabilitySet(String),

    /// A capability token outside the vocabulary
    #[error("Unknown capability token: {0}")]
    UnknownCapability(String),

    /// A rights code with no entry in the configured table
    #[error("Unknown rights code: {0}")]
    UnknownRightsCode(String),

    /// A malformed `code=CAPABILITY` entry in a rights map
    #[error("Invalid rights map entry: {0}")]
    InvalidRightsMapEntry(String),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
