//! OAuth 2.0 client-credentials token provider
//!
//! The service authenticates as itself (an app registration with a client
//! secret) against a Microsoft identity platform style authority:
//! `{instance}/{tenant}/oauth2/v2.0/token`. Tokens are cached per scope and
//! refreshed shortly before they expire.

use crate::error::{AuthError, AuthResult};
use crate::token::{AccessToken, TokenProvider};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponseType};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// App registration used to obtain tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredentialsConfig {
    /// Authority host, e.g. `https://login.microsoftonline.com/`
    pub instance: String,

    /// Directory (tenant) ID
    pub tenant_id: String,

    /// Application (client) ID
    pub client_id: String,

    /// Client secret
    #[serde(default, skip_serializing)]
    pub client_secret: String,

    /// Default scopes; falls back to `{client_id}/.default` when empty
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Default for ClientCredentialsConfig {
    fn default() -> Self {
        Self {
            instance: "https://login.microsoftonline.com/".to_string(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scopes: Vec::new(),
        }
    }
}

impl ClientCredentialsConfig {
    /// Authority URL: instance joined with the tenant.
    pub fn authority(&self) -> String {
        format!("{}/{}", self.instance.trim_end_matches('/'), self.tenant_id)
    }

    /// Token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority())
    }

    /// Authorization endpoint (unused by the client-credentials grant, but
    /// required to build an OAuth client).
    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority())
    }

    /// Scopes requested when the caller does not name one.
    pub fn default_scopes(&self) -> Vec<String> {
        if self.scopes.is_empty() {
            vec![format!("{}/.default", self.client_id)]
        } else {
            self.scopes.clone()
        }
    }

    /// Check that the credentials are complete.
    pub fn validate(&self) -> AuthResult<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(AuthError::ConfigError("tenant_id is required".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(AuthError::ConfigError("client_id is required".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(AuthError::ConfigError("client_secret is required".to_string()));
        }
        Ok(())
    }
}

/// Token provider backed by the client-credentials grant.
pub struct ClientCredentialsProvider {
    config: ClientCredentialsConfig,
    client: BasicClient,
    cache: RwLock<HashMap<String, AccessToken>>,
    refresh_margin: Duration,
}

impl std::fmt::Debug for ClientCredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsProvider")
            .field("authority", &self.config.authority())
            .field("client_id", &self.config.client_id)
            .finish()
    }
}

impl ClientCredentialsProvider {
    /// Create a provider for the given app registration.
    pub fn new(config: ClientCredentialsConfig) -> AuthResult<Self> {
        let auth_url = AuthUrl::new(config.authorize_url())
            .map_err(|e| AuthError::ConfigError(format!("Invalid authority: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url())
            .map_err(|e| AuthError::ConfigError(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        info!(
            authority = %config.authority(),
            scopes = ?config.default_scopes(),
            "Client credentials provider initialized"
        );

        Ok(Self {
            config,
            client,
            cache: RwLock::new(HashMap::new()),
            refresh_margin: Duration::seconds(60),
        })
    }

    /// Override how long before expiry a cached token is refreshed.
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientCredentialsConfig {
        &self.config
    }

    /// Drop a cached token, forcing the next call to hit the authority.
    pub async fn invalidate(&self, scope: &str) {
        self.cache.write().await.remove(scope);
    }

    async fn cached(&self, scope: &str) -> Option<AccessToken> {
        let cache = self.cache.read().await;
        cache
            .get(scope)
            .filter(|t| t.is_fresh(self.refresh_margin))
            .cloned()
    }

    async fn request(&self, scope: &str) -> AuthResult<AccessToken> {
        let response = self
            .client
            .exchange_client_credentials()
            .add_scope(Scope::new(scope.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => match resp.error() {
                    BasicErrorResponseType::InvalidClient
                    | BasicErrorResponseType::UnauthorizedClient => {
                        AuthError::Unauthorized(resp.to_string())
                    }
                    _ => AuthError::OAuthError(resp.to_string()),
                },
                other => AuthError::OAuthError(other.to_string()),
            })?;

        let lifetime = response
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .unwrap_or_else(|| Duration::hours(1));

        Ok(AccessToken::new(
            response.access_token().secret().clone(),
            scope,
            Utc::now() + lifetime,
        ))
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    #[instrument(skip(self))]
    async fn acquire_token(&self, scope: &str) -> AuthResult<AccessToken> {
        if let Some(token) = self.cached(scope).await {
            debug!("Using cached token");
            return Ok(token);
        }

        let token = match self.request(scope).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token request failed");
                return Err(e);
            }
        };

        #[cfg(feature = "jwt")]
        crate::inspect::log_token_details(token.secret(), "access token");

        debug!(token = %token.redacted(), expires_at = %token.expires_at(), "Acquired token");

        self.cache
            .write()
            .await
            .insert(scope.to_string(), token.clone());

        Ok(token)
    }
}
