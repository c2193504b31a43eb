//! One-time engine bootstrap.

use super::ProtectionEngine;
use crate::error::{ProtectionError, ProtectionResult};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Wraps an engine and runs its process bootstrap at most once.
///
/// Concurrent first callers wait for the single initialization; once it has
/// succeeded, later callers return immediately. A failed initialization is
/// not cached and is retried by the next caller.
pub struct EngineBootstrap {
    engine: Arc<dyn ProtectionEngine>,
    initialized: OnceCell<()>,
}

impl EngineBootstrap {
    pub fn new(engine: Arc<dyn ProtectionEngine>) -> Self {
        Self {
            engine,
            initialized: OnceCell::new(),
        }
    }

    /// The engine, initialized.
    pub async fn engine(&self) -> ProtectionResult<Arc<dyn ProtectionEngine>> {
        self.initialized
            .get_or_try_init(|| async {
                info!("Initializing protection engine");
                self.engine.initialize().await.map_err(|e| {
                    error!(error = %e, "Protection engine initialization failed");
                    ProtectionError::EngineHandle(e.to_string())
                })
            })
            .await?;
        Ok(self.engine.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }
}

impl std::fmt::Debug for EngineBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBootstrap")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
