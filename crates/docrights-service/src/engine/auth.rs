//! Engine auth delegate.
//!
//! The engine asks for tokens by resource (e.g. `https://api.aadrm.com`); the
//! delegate turns that into a `.default` scope for the token provider.

use super::{EngineError, EngineResult};
use docrights_auth::{scope_for_resource, TokenProvider};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct AuthDelegate {
    provider: Arc<dyn TokenProvider>,
}

impl AuthDelegate {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }

    /// Bearer token for an engine resource.
    #[instrument(skip(self))]
    pub async fn acquire_token(&self, resource: &str) -> EngineResult<String> {
        let scope = scope_for_resource(resource);
        match self.provider.acquire_token(&scope).await {
            Ok(token) => {
                debug!(token = %token.redacted(), "Acquired engine token");
                Ok(token.secret().to_string())
            }
            Err(e) => {
                warn!(error = %e, "Engine token acquisition failed");
                Err(EngineError::Auth(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for AuthDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthDelegate").finish_non_exhaustive()
    }
}
