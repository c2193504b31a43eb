//! Protection engine contract.
//!
//! The engine that actually labels and encrypts documents is an external
//! collaborator. The workflow drives it through three traits:
//!
//! - [`ProtectionEngine`]: process-wide bootstrap and per-request contexts
//! - [`EngineContext`]: label catalog, handle creation, teardown
//! - [`ProtectionHandle`]: one open document
//!
//! A context and its handles belong to exactly one request.

pub mod auth;
pub mod bootstrap;
pub mod envelope;

pub use auth::AuthDelegate;
pub use bootstrap::EngineBootstrap;
pub use envelope::EnvelopeEngine;

use async_trait::async_trait;
use docrights_model::{ProtectionPlan, RightsGrant};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not start or create a context
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// Token acquisition for the engine failed
    #[error("Engine authentication failed: {0}")]
    Auth(String),

    /// The document could not be read or is not in a supported format
    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    /// The engine refused an operation on the handle
    #[error("Operation rejected: {0}")]
    Rejected(String),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A sensitivity label from the engine's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

impl LabelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// First label whose name matches exactly.
pub fn select_label<'a>(labels: &'a [LabelInfo], name: &str) -> Option<&'a LabelInfo> {
    labels.iter().find(|label| label.name == name)
}

/// A protection engine.
#[async_trait]
pub trait ProtectionEngine: Send + Sync {
    /// Process-wide bootstrap. Called at most once, through
    /// [`EngineBootstrap`].
    async fn initialize(&self) -> EngineResult<()>;

    /// Create a context for one request.
    async fn create_context(&self) -> EngineResult<Box<dyn EngineContext>>;
}

/// Per-request engine context.
#[async_trait]
pub trait EngineContext: Send + Sync {
    /// The label catalog.
    async fn labels(&self) -> EngineResult<Vec<LabelInfo>>;

    /// Open an editable handle on a staged document.
    async fn open_handle(&self, path: &Path) -> EngineResult<Box<dyn ProtectionHandle>>;

    /// Tear the context down.
    async fn shutdown(&self) -> EngineResult<()>;
}

/// An open document.
///
/// Mutations are staged on the handle and written by [`commit`].
///
/// [`commit`]: ProtectionHandle::commit
#[async_trait]
pub trait ProtectionHandle: Send {
    /// Grants of the document's current protection; empty when unprotected.
    async fn current_grants(&self) -> EngineResult<Vec<RightsGrant>>;

    async fn has_protection(&self) -> EngineResult<bool>;

    async fn remove_protection(&mut self) -> EngineResult<()>;

    async fn delete_label(&mut self, justification: &str) -> EngineResult<()>;

    /// Protect with the plan's grants on behalf of `delegated_identity`.
    async fn apply_protection(
        &mut self,
        plan: &ProtectionPlan,
        delegated_identity: &str,
    ) -> EngineResult<()>;

    async fn apply_label(&mut self, label_id: &str, delegated_identity: &str) -> EngineResult<()>;

    /// Write the handle's current state to `output`.
    async fn commit(&mut self, output: &Path) -> EngineResult<()>;
}
