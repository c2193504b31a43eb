//! Unverified JWT inspection for diagnostics.
//!
//! Tokens issued to the service are opaque to it; the protection engine and
//! the mail API validate them. For operational logging we still want to know
//! who a token was issued to and what it grants, so this module decodes the
//! claims without checking the signature.
//!
//! Never use these details for an authorization decision.

use crate::error::{AuthError, AuthResult};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Claims worth logging from an access token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenDetails {
    /// Subject
    #[serde(default)]
    pub sub: Option<String>,

    /// Audience; a string or a list depending on the issuer
    #[serde(default)]
    pub aud: Option<serde_json::Value>,

    /// Delegated scopes (space separated)
    #[serde(default)]
    pub scp: Option<String>,

    /// Application roles
    #[serde(default)]
    pub roles: Option<Vec<String>>,

    /// Calling application ID
    #[serde(default)]
    pub appid: Option<String>,

    /// Expiry (Unix timestamp)
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenDetails {
    /// Audience rendered as a comma-separated string.
    pub fn audience(&self) -> String {
        match &self.aud {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            _ => "N/A".to_string(),
        }
    }

    /// Scopes, or roles for app-only tokens.
    pub fn grants(&self) -> String {
        if let Some(scp) = &self.scp {
            return scp.clone();
        }
        match &self.roles {
            Some(roles) if !roles.is_empty() => roles.join(" "),
            _ => "N/A".to_string(),
        }
    }

    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }
}

/// Decode a JWT's claims without verifying it.
pub fn inspect_token(token: &str) -> AuthResult<TokenDetails> {
    let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data: TokenData<TokenDetails> = decode(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    Ok(data.claims)
}

/// Log the interesting claims of a token at info level.
pub fn log_token_details(token: &str, token_type: &str) {
    match inspect_token(token) {
        Ok(details) => {
            info!(
                token_type,
                subject = details.sub.as_deref().unwrap_or("N/A"),
                audience = %details.audience(),
                grants = %details.grants(),
                expires = %details
                    .expires_at()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "N/A".to_string()),
                "Token details"
            );
        }
        Err(_) => warn!(token_type, "Unable to parse token as JWT"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"issuer-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_inspect_without_key() {
        let jwt = token(serde_json::json!({
            "sub": "svc-principal",
            "aud": "https://api.aadrm.com",
            "roles": ["Content.SuperUser"],
            "exp": 4_102_444_800i64,
        }));

        let details = inspect_token(&jwt).unwrap();
        assert_eq!(details.sub.as_deref(), Some("svc-principal"));
        assert_eq!(details.audience(), "https://api.aadrm.com");
        assert_eq!(details.grants(), "Content.SuperUser");
        assert!(details.expires_at().is_some());
    }

    #[test]
    fn test_inspect_expired_token_still_decodes() {
        let jwt = token(serde_json::json!({
            "aud": ["a", "b"],
            "scp": "Mail.Send",
            "exp": 1i64,
        }));

        let details = inspect_token(&jwt).unwrap();
        assert_eq!(details.audience(), "a, b");
        assert_eq!(details.grants(), "Mail.Send");
    }

    #[test]
    fn test_inspect_rejects_opaque_token() {
        assert!(matches!(
            inspect_token("not-a-jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
