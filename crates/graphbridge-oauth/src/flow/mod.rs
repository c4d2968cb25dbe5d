//! `OAuth2` authorization flows.

mod callback;
mod code;
mod pkce;

pub use callback::{CallbackReceiver, CallbackServer, SHUTDOWN_GRACE};
pub use code::AuthorizationCodeFlow;
pub use pkce::PkceChallenge;

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::token::{TokenRecord, TokenResponse};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use tracing::{debug, error};

/// Public `OAuth2` client configuration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Redirect URI served by the local callback listener.
    pub redirect_uri: String,
    /// Provider configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        provider: Provider,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            provider,
            http_client: Client::new(),
        }
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// The returned record has no `cached_at`; the cache stamps it on save.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenEndpoint`] on a non-200 answer, [`Error::Json`]
    /// if the body is not a token response, or [`Error::Http`] on transport
    /// failure.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenRecord> {
        let mut params = HashMap::new();
        params.insert("client_id", self.client_id.as_str());
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", self.redirect_uri.as_str());
        params.insert("code_verifier", code_verifier);

        debug!(token_url = %self.provider.token_url, "Exchanging authorization code");

        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            error!(status = status.as_u16(), "Token exchange rejected");
            return Err(Error::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let token_response: TokenResponse = serde_json::from_str(&body)?;
        Ok(TokenRecord::from(token_response))
    }
}
