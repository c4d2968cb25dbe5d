//! Interactive token acquisition backed by the token cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::TokenCache;
use crate::error::{Error, Result};
use crate::flow::{AuthorizationCodeFlow, CallbackReceiver, CallbackServer, OAuthClient};
use crate::token::TokenRecord;

/// How long the operator has to complete the browser step.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Shows the authorization URL to whoever has to open it.
pub trait UrlPresenter: Send + Sync {
    /// Presents the URL.
    fn present(&self, url: &Url);
}

impl<F> UrlPresenter for F
where
    F: Fn(&Url) + Send + Sync,
{
    fn present(&self, url: &Url) {
        self(url);
    }
}

/// Prints the URL and tries to open it in the default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPresenter;

impl UrlPresenter for BrowserPresenter {
    fn present(&self, url: &Url) {
        println!("Open the following URL in your browser to sign in:\n\n{url}\n");
        if let Err(e) = opener::open(url.as_str()) {
            warn!(error = %e, "Failed to open browser");
        }
    }
}

/// Hands out access tokens, running the PKCE flow when the cache is empty.
pub struct Authenticator {
    client: OAuthClient,
    cache: TokenCache,
    presenter: Arc<dyn UrlPresenter>,
    timeout: Duration,
    in_flight: Mutex<()>,
}

impl Authenticator {
    /// Creates an authenticator that presents URLs with [`BrowserPresenter`].
    #[must_use]
    pub fn new(client: OAuthClient, cache: TokenCache) -> Self {
        Self {
            client,
            cache,
            presenter: Arc::new(BrowserPresenter),
            timeout: DEFAULT_AUTH_TIMEOUT,
            in_flight: Mutex::new(()),
        }
    }

    /// Replaces the URL presenter.
    #[must_use]
    pub fn with_presenter(mut self, presenter: impl UrlPresenter + 'static) -> Self {
        self.presenter = Arc::new(presenter);
        self
    }

    /// Sets how long to wait for the redirect.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the token cache.
    #[must_use]
    pub const fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Returns a valid access token.
    ///
    /// Serves the cached token while it is fresh; otherwise runs the
    /// interactive flow and caches the result. A failed cache write is
    /// logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another acquisition is running, or the
    /// error that ended the acquisition.
    pub async fn get_access_token(&self) -> Result<String> {
        if let Ok(record) = self.cache.load().await {
            info!(
                remaining_secs = record.remaining_validity().as_secs(),
                "Using cached access token"
            );
            return Ok(record.access_token);
        }

        let mut record = self.acquire_new_token().await?;

        if let Err(e) = self.cache.save(&mut record).await {
            warn!(error = %e, "Failed to cache access token");
        }

        Ok(record.access_token)
    }

    /// Runs one interactive authorization attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if binding, the redirect, or the exchange fails, or
    /// if the attempt times out.
    pub async fn acquire_new_token(&self) -> Result<TokenRecord> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return Err(Error::Busy);
        };

        let redirect_uri = Url::parse(&self.client.redirect_uri)?;
        let flow = AuthorizationCodeFlow::new(&self.client);
        let auth_url = flow.authorization_url();

        let (server, result_rx) = CallbackServer::bind(&redirect_uri).await?;

        self.presenter.present(&auth_url);
        info!(timeout_secs = self.timeout.as_secs(), "Waiting for authorization");

        let outcome = self.await_and_exchange(&flow, result_rx).await;
        server.shutdown().await;

        match &outcome {
            Ok(_) => info!("Authorization completed"),
            Err(e) => warn!(error = %e, "Authorization failed"),
        }
        outcome
    }

    async fn await_and_exchange(
        &self,
        flow: &AuthorizationCodeFlow<'_>,
        result_rx: CallbackReceiver,
    ) -> Result<TokenRecord> {
        let code = match tokio::time::timeout(self.timeout, result_rx).await {
            Err(_) => return Err(Error::Timeout(self.timeout)),
            Ok(Err(_)) => return Err(Error::CallbackClosed),
            Ok(Ok(result)) => result?,
        };

        debug!("Exchanging authorization code for token");
        flow.exchange_code(&code).await
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("client", &self.client)
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn authenticator(dir: &tempfile::TempDir) -> Authenticator {
        let client = OAuthClient::new(
            "client",
            "http://127.0.0.1:0/callback",
            Provider::microsoft().unwrap(),
        );
        Authenticator::new(client, TokenCache::new(dir.path().join("token.json")))
    }

    #[tokio::test]
    async fn test_cached_token_skips_flow() {
        let dir = tempfile::tempdir().unwrap();
        let presented = Arc::new(AtomicUsize::new(0));
        let counter = presented.clone();
        let auth = authenticator(&dir).with_presenter(move |_: &Url| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut record = TokenRecord::new("cached-token", 3600).with_cached_at(Utc::now());
        auth.cache().save(&mut record).await.unwrap();

        assert_eq!(auth.get_access_token().await.unwrap(), "cached-token");
        assert_eq!(presented.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_without_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(&dir)
            .with_presenter(|_: &Url| {})
            .with_timeout(Duration::from_millis(50));

        let err = auth.get_access_token().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(auth.cache().load().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_redirect_uri() {
        let dir = tempfile::tempdir().unwrap();
        let client = OAuthClient::new("client", "not a uri", Provider::microsoft().unwrap());
        let auth = Authenticator::new(client, TokenCache::new(dir.path().join("t.json")))
            .with_presenter(|_: &Url| {});

        assert!(matches!(
            auth.acquire_new_token().await,
            Err(Error::UrlError(_))
        ));
    }
}
