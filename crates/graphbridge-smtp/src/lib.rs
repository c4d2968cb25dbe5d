//! # graphbridge-smtp
//!
//! The SMTP side of the gateway: a listener that accepts mail from ordinary
//! clients, authenticates them with one static credential, and hands each
//! message to a [`MailSender`].
//!
//! ## Features
//!
//! - **Commands**: EHLO/HELO, AUTH PLAIN, MAIL, RCPT, DATA, RSET, NOOP, QUIT
//! - **Extensions**: AUTH PLAIN, SIZE, 8BITMIME (no STARTTLS)
//! - **Limits**: 10 s read/write deadlines, 10 MiB messages, 50 recipients
//! - **Extraction**: subject, Cc and one body per message via
//!   `graphbridge-mime`
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use graphbridge_smtp::{Backend, Server, ServerConfig};
//!
//! let backend = Backend::new("msgraph", "secret", Arc::new(sender));
//! let server = Server::new(ServerConfig::new("localhost", 2525), backend);
//! server.run(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```
//!
//! ## Session States
//!
//! ```text
//! greeting ── EHLO ──→ ready ── AUTH ──→ authenticated
//!                                            │
//!      ┌───────────── RSET / DATA done ──────┤
//!      ↓                                     │
//!  MAIL FROM ──→ RCPT TO (1..=50) ──→ DATA ──┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: client command parsing
//! - [`connection`]: framed stream and per-connection dialogue
//! - [`parser`]: path and SASL PLAIN argument parsing
//! - [`types`]: replies, addresses, extensions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
mod sender;
mod server;
mod session;
pub mod types;

pub use error::{Error, Result, SendError};
pub use sender::MailSender;
pub use server::{DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_PORT, Server, ServerConfig};
pub use session::{Backend, DEFAULT_MAX_RECIPIENTS, Session};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
