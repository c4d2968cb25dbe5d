//! # graphbridge-oauth
//!
//! `OAuth2` authorization code flow with PKCE against the Microsoft identity
//! platform, with a file-backed token cache.
//!
//! ## Features
//!
//! - **PKCE**: fresh S256 verifier/challenge pair per attempt (RFC 7636)
//! - **Loopback callback**: short-lived axum listener on the redirect URI
//! - **Token cache**: JSON file, owner-only permissions, 300 second expiry buffer
//! - **Single flight**: overlapping acquisitions are rejected with [`Error::Busy`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use graphbridge_oauth::{Authenticator, OAuthClient, Provider, TokenCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Provider::microsoft()?;
//!     let client = OAuthClient::new("client-id", "http://localhost:5225/callback", provider);
//!     let auth = Authenticator::new(client, TokenCache::new("/tmp/token_cache.json"));
//!
//!     // Opens the browser on a cache miss and waits for the redirect
//!     let token = auth.get_access_token().await?;
//!     println!("Access token: {token}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod authenticator;
mod cache;
mod error;
pub mod flow;
pub mod provider;
pub mod token;

pub use authenticator::{Authenticator, BrowserPresenter, DEFAULT_AUTH_TIMEOUT, UrlPresenter};
pub use cache::TokenCache;
pub use error::{Error, Result};
pub use flow::{AuthorizationCodeFlow, CallbackServer, OAuthClient, PkceChallenge};
pub use provider::Provider;
pub use token::{EXPIRY_BUFFER_SECS, TokenRecord};
