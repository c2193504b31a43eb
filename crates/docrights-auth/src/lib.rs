//! # Docrights Authentication
//!
//! Token acquisition for the protection engine's auth delegate and for the
//! outbound mail notifier.
//!
//! ## Overview
//!
//! The docrights-auth crate handles:
//! - **Token provider contract**: [`TokenProvider::acquire_token`] for a
//!   `<resource>/.default` scope
//! - **Client credentials**: OAuth 2.0 client-credentials grant against a
//!   tenant authority, with a per-scope token cache
//! - **Diagnostics**: unverified JWT inspection so acquired tokens can be
//!   described in logs without ever logging the token itself
//!
//! ## Features
//!
//! - `oauth` (default): client-credentials provider using oauth2
//! - `jwt` (default): token inspection using jsonwebtoken
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docrights_auth::{
//!     scope_for_resource, ClientCredentialsConfig, ClientCredentialsProvider, TokenProvider,
//! };
//!
//! async fn example() -> docrights_auth::AuthResult<()> {
//!     let provider = ClientCredentialsProvider::new(ClientCredentialsConfig {
//!         tenant_id: "contoso.onmicrosoft.com".to_string(),
//!         client_id: "00000000-0000-0000-0000-000000000000".to_string(),
//!         client_secret: "secret".to_string(),
//!         ..Default::default()
//!     })?;
//!
//!     let token = provider
//!         .acquire_token(&scope_for_resource("https://api.aadrm.com"))
//!         .await?;
//!     println!("{}", token.bearer_header());
//!     Ok(())
//! }
//! ```

#[cfg(feature = "oauth")]
pub mod client_credentials;
pub mod error;
#[cfg(feature = "jwt")]
pub mod inspect;
pub mod token;

// Re-export main types
pub use error::{AuthError, AuthResult};
pub use token::{scope_for_resource, AccessToken, StaticTokenProvider, TokenProvider};

#[cfg(feature = "oauth")]
pub use client_credentials::{ClientCredentialsConfig, ClientCredentialsProvider};

#[cfg(feature = "jwt")]
pub use inspect::{inspect_token, log_token_details, TokenDetails};
