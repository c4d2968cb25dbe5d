//! Loopback HTTP listener that receives the authorization redirect.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

/// Grace period for in-flight callback requests on shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<html><body><h1>Authentication successful</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h1>Authentication failed</h1>\
<p>No authorization code was received. Check the terminal for details.</p></body></html>";

/// Receives the single outcome of one authorization attempt.
pub type CallbackReceiver = oneshot::Receiver<Result<String>>;

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

struct CallbackState {
    result_tx: Mutex<Option<oneshot::Sender<Result<String>>>>,
}

impl CallbackState {
    /// Delivers the outcome once. Returns false if it was already delivered.
    fn deliver(&self, outcome: Result<String>) -> bool {
        let sender = self
            .result_tx
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or_default();

        sender.is_some_and(|tx| {
            // receiver gone means the attempt already ended
            let _ = tx.send(outcome);
            true
        })
    }
}

/// Running callback listener scoped to one authorization attempt.
///
/// Dropping the server stops it without waiting; prefer
/// [`shutdown`](Self::shutdown) for the bounded graceful path.
#[derive(Debug)]
pub struct CallbackServer {
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Binds the host and port of `redirect_uri` and serves its path.
    ///
    /// The returned receiver resolves with the authorization code, or with
    /// [`Error::Provider`] if the redirect carried an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the address cannot be bound and
    /// [`Error::InvalidConfig`] if the URI has no host or port.
    pub async fn bind(redirect_uri: &Url) -> Result<(Self, CallbackReceiver)> {
        let host = redirect_uri
            .host_str()
            .ok_or_else(|| Error::InvalidConfig(format!("redirect URI has no host: {redirect_uri}")))?;
        let port = redirect_uri
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidConfig(format!("redirect URI has no port: {redirect_uri}")))?;
        let path = match redirect_uri.path() {
            "" => "/",
            p => p,
        };

        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| Error::Bind {
                addr: format!("{host}:{port}"),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (result_tx, result_rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            result_tx: Mutex::new(Some(result_tx)),
        });

        let app = Router::new()
            .route(path, get(handle_callback))
            .with_state(state);

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "Callback listener failed");
            }
            debug!("Callback listener stopped");
        });

        info!(addr = %local_addr, path, "Callback listener started");

        Ok((
            Self {
                local_addr,
                stop_tx,
                handle: Some(handle),
            },
            result_rx,
        ))
    }

    /// Returns the bound socket address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and waits up to [`SHUTDOWN_GRACE`] for open requests.
    ///
    /// The listener is aborted if the grace period runs out.
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(true);

        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!("Callback listener did not stop within grace period, aborting");
                handle.abort();
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(query): Query<CallbackQuery>,
) -> (StatusCode, Html<&'static str>) {
    if let Some(code) = query.code {
        if state.deliver(Ok(code)) {
            debug!("Authorization code received");
            return (StatusCode::OK, Html(SUCCESS_PAGE));
        }
        return (StatusCode::CONFLICT, Html(FAILURE_PAGE));
    }

    match query.error {
        Some(error) => {
            let description = query.error_description.unwrap_or_default();
            warn!(%error, %description, "Authorization redirect carried an error");
            state.deliver(Err(Error::provider_error(error, description)));
        }
        None => warn!("Callback request had neither code nor error"),
    }

    (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
}
