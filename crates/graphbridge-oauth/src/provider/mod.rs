//! `OAuth2` provider configurations.

use crate::error::{Error, Result};
use url::Url;

/// Default Microsoft identity platform authority (multi-tenant).
pub const MICROSOFT_COMMON_AUTHORITY: &str = "https://login.microsoftonline.com/common";

/// Scopes needed to read the signed-in profile and send mail through Graph.
pub const GRAPH_MAIL_SCOPES: [&str; 4] = ["User.Read", "Mail.Send", "Mail.ReadWrite", "offline_access"];

/// `OAuth2` provider configuration.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Microsoft").
    pub name: String,
    /// Authorization endpoint URL.
    pub auth_url: Url,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Default scopes.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a new provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if URLs are invalid.
    pub fn new(
        name: impl Into<String>,
        auth_url: impl AsRef<str>,
        token_url: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            auth_url: Url::parse(auth_url.as_ref())?,
            token_url: Url::parse(token_url.as_ref())?,
            default_scopes: Vec::new(),
        })
    }

    /// Microsoft identity platform provider rooted at an authority URL.
    ///
    /// Endpoints are `{authority}/oauth2/v2.0/authorize` and
    /// `{authority}/oauth2/v2.0/token`. Scopes default to profile read,
    /// mail send, mail read-write and offline access.
    ///
    /// # Errors
    ///
    /// Returns an error if the authority does not form valid base URLs.
    pub fn from_authority(authority: &str) -> Result<Self> {
        let authority = authority.trim_end_matches('/');
        let provider = Self::new(
            "Microsoft",
            format!("{authority}/oauth2/v2.0/authorize"),
            format!("{authority}/oauth2/v2.0/token"),
        )?
        .with_default_scopes(GRAPH_MAIL_SCOPES.iter().map(ToString::to_string).collect());
        provider.validate()?;
        Ok(provider)
    }

    /// Microsoft provider on the multi-tenant `common` authority.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft() -> Result<Self> {
        Self::from_authority(MICROSOFT_COMMON_AUTHORITY)
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Validates that required URLs are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.auth_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig("auth_url is not a base URL".into()));
        }
        if self.token_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig("token_url is not a base URL".into()));
        }
        if self.default_scopes.is_empty() {
            return Err(Error::InvalidConfig("no scopes configured".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_microsoft_provider() {
        let provider = Provider::microsoft().unwrap();
        assert_eq!(provider.name, "Microsoft");
        assert_eq!(
            provider.auth_url.as_str(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
        );
        assert_eq!(
            provider.token_url.as_str(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
        assert_eq!(provider.default_scopes.len(), 4);
        provider.validate().unwrap();
    }

    #[test]
    fn test_authority_trailing_slash() {
        let provider = Provider::from_authority("https://login.example.com/tenant/").unwrap();
        assert_eq!(
            provider.token_url.as_str(),
            "https://login.example.com/tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_invalid_authority() {
        assert!(Provider::from_authority("not a url").is_err());
    }

    #[test]
    fn test_authority_must_be_base_url() {
        let err = Provider::from_authority("mailto:admin@contoso.com").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn test_custom_provider_without_scopes() {
        let provider = Provider::new(
            "Custom",
            "https://auth.example.com/authorize",
            "https://auth.example.com/token",
        )
        .unwrap();

        assert!(provider.validate().is_err());
        assert!(
            provider
                .with_default_scopes(vec!["email".to_string()])
                .validate()
                .is_ok()
        );
    }
}
