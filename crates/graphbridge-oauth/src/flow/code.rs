//! Authorization Code Flow with PKCE.

use super::{OAuthClient, PkceChallenge};
use crate::error::Result;
use crate::token::TokenRecord;
use url::Url;

/// One authorization attempt.
///
/// Owns a freshly generated PKCE pair. The pair is dropped with the flow,
/// so a new attempt always starts with a new verifier.
#[derive(Debug)]
pub struct AuthorizationCodeFlow<'a> {
    client: &'a OAuthClient,
    pkce: PkceChallenge,
}

impl<'a> AuthorizationCodeFlow<'a> {
    /// Starts an attempt with a new PKCE pair.
    #[must_use]
    pub fn new(client: &'a OAuthClient) -> Self {
        Self {
            client,
            pkce: PkceChallenge::generate(),
        }
    }

    /// Builds the authorization URL for user consent.
    ///
    /// Requests the provider's default scopes, a query-mode redirect and the
    /// account picker.
    #[must_use]
    pub fn authorization_url(&self) -> Url {
        let mut url = self.client.provider.auth_url.clone();

        url.query_pairs_mut()
            .append_pair("client_id", &self.client.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.client.redirect_uri)
            .append_pair("scope", &self.client.provider.default_scopes.join(" "))
            .append_pair("code_challenge", self.pkce.challenge())
            .append_pair("code_challenge_method", self.pkce.method())
            .append_pair("response_mode", "query")
            .append_pair("prompt", "select_account");

        url
    }

    /// Exchanges the authorization code using this attempt's verifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange fails.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
        self.client.exchange_code(code, self.pkce.verifier()).await
    }

    /// Returns the PKCE pair of this attempt.
    #[must_use]
    pub const fn pkce(&self) -> &PkceChallenge {
        &self.pkce
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use std::collections::HashMap;

    fn client() -> OAuthClient {
        OAuthClient::new(
            "test_client",
            "http://localhost:5225/callback",
            Provider::microsoft().unwrap(),
        )
    }

    #[test]
    fn test_authorization_url() {
        let client = client();
        let flow = AuthorizationCodeFlow::new(&client);
        let url = flow.authorization_url();

        assert!(url.as_str().starts_with(
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize?"
        ));

        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "test_client");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], "http://localhost:5225/callback");
        assert_eq!(
            params["scope"],
            "User.Read Mail.Send Mail.ReadWrite offline_access"
        );
        assert_eq!(params["code_challenge"], flow.pkce().challenge());
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["response_mode"], "query");
        assert_eq!(params["prompt"], "select_account");
        assert_eq!(params.len(), 8);
    }

    #[test]
    fn test_scope_is_space_separated() {
        let client = client();
        let url = AuthorizationCodeFlow::new(&client).authorization_url();
        // space becomes + in query parameters
        assert!(url.as_str().contains("scope=User.Read+Mail.Send"));
    }

    #[test]
    fn test_each_attempt_gets_fresh_pkce() {
        let client = client();
        let first = AuthorizationCodeFlow::new(&client);
        let second = AuthorizationCodeFlow::new(&client);
        assert_ne!(first.pkce().verifier(), second.pkce().verifier());
    }
}
