//! TCP listener that hands each connection its own session.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::connection::serve_connection;
use crate::error::Result;
use crate::sender::MailSender;
use crate::session::Backend;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 2525;

/// Default maximum message size (10 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, `host:port`.
    pub addr: String,
    /// Domain announced in the greeting and EHLO reply.
    pub domain: String,
    /// Deadline for each line read from the client.
    pub read_timeout: Duration,
    /// Deadline for each reply written to the client.
    pub write_timeout: Duration,
    /// Maximum DATA size in bytes, advertised as SIZE.
    pub max_message_bytes: usize,
}

impl ServerConfig {
    /// Creates a config listening on `host:port` with default limits.
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: format!("localhost:{DEFAULT_PORT}"),
            domain: "localhost".to_string(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// SMTP gateway server.
pub struct Server<S> {
    config: Arc<ServerConfig>,
    backend: Arc<Backend<S>>,
}

impl<S: MailSender> Server<S> {
    /// Creates a server.
    pub fn new(config: ServerConfig, backend: Backend<S>) -> Self {
        Self {
            config: Arc::new(config),
            backend: Arc::new(backend),
        }
    }

    /// Returns the listener settings.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!(
            addr = %self.config.addr,
            auth_enabled = self.backend.requires_auth(),
            "SMTP server listening"
        );
        if !self.backend.requires_auth() {
            warn!(
                addr = %self.config.addr,
                "SMTP authentication disabled: username or password is empty, any client can send"
            );
        }
        self.serve(listener, shutdown).await
    }

    /// Accepts connections on `listener` until `shutdown` resolves.
    ///
    /// Connections already in progress keep running on their own tasks.
    ///
    /// # Errors
    ///
    /// Currently infallible; accept errors are logged and skipped.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => self.spawn_connection(socket, peer),
                        Err(e) => warn!(error = %e, "SMTP accept error"),
                    }
                }
                () = &mut shutdown => {
                    info!("SMTP server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, socket: TcpStream, peer: SocketAddr) {
        let session = self.backend.new_session();
        let config = Arc::clone(&self.config);

        tokio::spawn(async move {
            debug!(%peer, "connection accepted");
            match serve_connection(socket, session, &config).await {
                Ok(()) => debug!(%peer, "connection closed"),
                Err(e) => debug!(%peer, error = %e, "connection ended"),
            }
        });
    }
}

impl<S> std::fmt::Debug for Server<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .finish()
    }
}
