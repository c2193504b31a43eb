//! Bearer tokens and the token provider contract.
//!
//! The protection engine's auth delegate and the mail notifier both ask a
//! [`TokenProvider`] for a bearer token scoped to a resource. Scopes have the
//! form `<resource>/.default`.

use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// An acquired bearer token.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    scope: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token that expires at the given instant.
    pub fn new(secret: impl Into<String>, scope: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            scope: scope.into(),
            expires_at,
        }
    }

    /// The raw token value.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The scope this token was issued for.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// When the token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check whether the token is still usable, keeping `margin` in reserve.
    pub fn is_fresh(&self, margin: Duration) -> bool {
        Utc::now() + margin < self.expires_at
    }

    /// Value for an `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.secret)
    }

    /// Short prefix safe to write to logs.
    pub fn redacted(&self) -> String {
        let prefix: String = self.secret.chars().take(16).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &self.redacted())
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquire a token for a scope such as `https://graph.microsoft.com/.default`.
    async fn acquire_token(&self, scope: &str) -> AuthResult<AccessToken>;
}

/// Build the `.default` scope for a resource.
///
/// ```
/// use docrights_auth::scope_for_resource;
///
/// assert_eq!(scope_for_resource("https://api.aadrm.com"), "https://api.aadrm.com/.default");
/// assert_eq!(scope_for_resource("https://api.aadrm.com/"), "https://api.aadrm.com/.default");
/// ```
pub fn scope_for_resource(resource: &str) -> String {
    format!("{}/.default", resource.trim_end_matches('/'))
}

/// Token provider that always hands out the same token.
///
/// Used for local development against an engine that does not check tokens,
/// and in tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    secret: String,
    lifetime: Duration,
}

impl StaticTokenProvider {
    /// Create a provider for a fixed token value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            lifetime: Duration::hours(1),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn acquire_token(&self, scope: &str) -> AuthResult<AccessToken> {
        if scope.trim().is_empty() {
            return Err(AuthError::ConfigError("Empty token scope".to_string()));
        }
        Ok(AccessToken::new(
            self.secret.clone(),
            scope,
            Utc::now() + self.lifetime,
        ))
    }
}
