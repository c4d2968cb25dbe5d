//! # graphbridge-core
//!
//! The pieces of graphbridge that sit around the protocol crates:
//!
//! - **Configuration** - the JSON file under `~/.graphbridge`, created with
//!   defaults and a random SMTP password on first use
//! - **Graph client** - signed-in user lookup and `sendMail`, implementing
//!   [`graphbridge_smtp::MailSender`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod graph;

pub use config::{Config, GraphConfig, Manager, SmtpConfig};
pub use error::{Error, Result};
pub use graph::{DEFAULT_API_BASE_URL, GraphClient, UserInfo};
