//! Error types for `OAuth2` operations.

use std::io;
use std::time::Duration;

/// Result type alias for `OAuth2` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `OAuth2` error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The redirect callback listener could not be bound.
    #[error("Failed to bind callback listener on {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: String,
        /// Underlying socket error.
        source: io::Error,
    },

    /// The identity provider reported an error on the redirect.
    #[error("Authorization error: {error} - {description}")]
    Provider {
        /// Error code (e.g., `access_denied`).
        error: String,
        /// Human-readable description.
        description: String,
    },

    /// The token endpoint answered with a non-success status.
    #[error("Token endpoint returned {status}: {body}")]
    TokenEndpoint {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Cached token is expired.
    #[error("Token expired")]
    TokenExpired,

    /// Authorization timeout.
    #[error("Authorization timed out after {0:?}")]
    Timeout(Duration),

    /// The callback listener stopped before a code was delivered.
    #[error("Callback listener closed before an authorization code arrived")]
    CallbackClosed,

    /// Another acquisition is already running on this authenticator.
    #[error("An authorization attempt is already in progress")]
    Busy,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl Error {
    /// Creates a provider error from error code and description.
    #[must_use]
    pub fn provider_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Provider {
            error: error.into(),
            description: description.into(),
        }
    }
}
