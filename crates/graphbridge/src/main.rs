//! `graphbridge` - local SMTP gateway for Microsoft Graph
//!
//! Accepts mail from local applications over SMTP and delivers it with the
//! signed-in user's Graph `sendMail` permission.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use graphbridge_core::{GraphClient, Manager};
use graphbridge_oauth::{Authenticator, OAuthClient, Provider, TokenCache};
use graphbridge_smtp::{Backend, DEFAULT_PORT, Server, ServerConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "graphbridge", version)]
#[command(about = "SMTP to Microsoft Graph gateway", long_about = None)]
struct Cli {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and cache an access token
    Auth {
        /// Call Graph with the token and print the signed-in user
        #[arg(long)]
        test: bool,
    },
    /// Run the SMTP gateway
    Serve {
        /// Port to listen on; any value but the default is saved to the config file
        /// and used by later runs
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Remove the cached access token
    Logout,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut manager = Manager::open_default()
        .await
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Auth { test } => auth(&manager, test).await,
        Commands::Serve { port } => serve(&mut manager, port).await,
        Commands::Logout => logout(&manager).await,
    }
}

fn authenticator(manager: &Manager) -> Result<Authenticator> {
    let graph = manager.graph();
    let provider = Provider::from_authority(&graph.authority_url)
        .with_context(|| format!("invalid authority URL {}", graph.authority_url))?;
    let client = OAuthClient::new(&graph.client_id, &graph.redirect_uri, provider);
    Ok(Authenticator::new(client, TokenCache::new(&graph.token_cache)))
}

async fn auth(manager: &Manager, test: bool) -> Result<()> {
    let token = authenticator(manager)?
        .get_access_token()
        .await
        .context("authentication failed")?;
    println!("Authentication successful.");

    if test {
        let client = GraphClient::new(token, &manager.graph().api_base_url);
        let user = client
            .user_info()
            .await
            .context("failed to fetch user info")?;
        println!(
            "Signed in as {} <{}>",
            user.display_name.as_deref().unwrap_or("(no name)"),
            user.mail
                .as_deref()
                .or(user.user_principal_name.as_deref())
                .unwrap_or("(no address)"),
        );
    }

    Ok(())
}

/// The `-p` flag wins when set to anything but the default; otherwise the
/// saved port is used.
const fn resolve_port(flag: u16, saved: u16) -> u16 {
    if flag == DEFAULT_PORT { saved } else { flag }
}

async fn serve(manager: &mut Manager, flag_port: u16) -> Result<()> {
    let port = resolve_port(flag_port, manager.smtp().port);
    if port != manager.smtp().port {
        if let Err(e) = manager.update_smtp_port(port).await {
            warn!(error = %e, port, "failed to save port to config");
        }
    }

    let smtp = manager.smtp().clone();
    println!("SMTP connection settings:");
    println!("  server:   {}:{port}", smtp.host);
    println!("  username: {}", smtp.username);
    println!("  password: {}", smtp.password);
    println!("  security: none (plaintext)");
    println!("  config:   {}", manager.path().display());
    println!();

    let token = authenticator(manager)?
        .get_access_token()
        .await
        .context("authentication failed")?;
    let graph = GraphClient::new(token, &manager.graph().api_base_url);
    let user = graph
        .user_info()
        .await
        .context("failed to verify Graph access")?;
    info!(
        user = user.user_principal_name.as_deref().unwrap_or_default(),
        "Graph access verified"
    );

    let backend = Backend::new(smtp.username, smtp.password, Arc::new(graph));
    let server = Server::new(ServerConfig::new(&smtp.host, port), backend);

    if let Err(e) = server.run(shutdown_signal()).await {
        error!(error = %e, "SMTP server failed");
        return Err(e).context("SMTP server failed");
    }

    info!("graphbridge stopped");
    Ok(())
}

async fn logout(manager: &Manager) -> Result<()> {
    TokenCache::new(&manager.graph().token_cache)
        .clear()
        .await
        .context("failed to remove token cache")?;
    println!("Logged out.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
