//! Error types for SMTP operations.

use std::io;

use crate::types::{Reply, ReplyCode};

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by a [`MailSender`](crate::MailSender).
pub type SendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// SMTP error types.
///
/// Every variant maps to the reply sent to the client, see
/// [`Error::reply_code`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The client did not send anything within the read timeout.
    #[error("Timed out waiting for client")]
    Timeout,

    /// A command or DATA line exceeded the length limit.
    #[error("Line too long")]
    LineTooLong,

    /// Unrecognized command.
    #[error("Command not recognized: {0}")]
    UnknownCommand(String),

    /// Malformed command arguments.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Command is not valid in the current session state.
    #[error("Bad sequence of commands: {0}")]
    BadSequence(String),

    /// AUTH with a mechanism other than PLAIN.
    #[error("Unsupported authentication mechanism: {0}")]
    UnsupportedMechanism(String),

    /// Username or password did not match.
    #[error("Invalid credentials")]
    AuthFailed,

    /// MAIL before a successful AUTH.
    #[error("Authentication required")]
    AuthRequired,

    /// Recipient limit reached.
    #[error("Too many recipients (max {0})")]
    TooManyRecipients(usize),

    /// Message too large.
    #[error("Message exceeds size limit: {0} bytes")]
    MessageTooLarge(usize),

    /// DATA without any recipient.
    #[error("No recipients")]
    NoRecipients,

    /// Submitted message could not be parsed.
    #[error("Message parse error: {0}")]
    Mime(#[from] graphbridge_mime::Error),

    /// The mail sender rejected or failed the message.
    #[error("Mail send failed: {0}")]
    Send(#[source] SendError),
}

impl Error {
    /// Whether the connection can no longer be used after this error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout)
    }

    /// Returns the reply code sent to the client for this error.
    #[must_use]
    pub const fn reply_code(&self) -> ReplyCode {
        match self {
            Self::Io(_) | Self::Timeout => ReplyCode::SERVICE_UNAVAILABLE,
            Self::LineTooLong => ReplyCode::SYNTAX_ERROR,
            Self::UnknownCommand(_) => ReplyCode::NOT_IMPLEMENTED,
            Self::Syntax(_) | Self::InvalidAddress(_) => ReplyCode::PARAMETER_ERROR,
            Self::BadSequence(_) => ReplyCode::BAD_SEQUENCE,
            Self::UnsupportedMechanism(_) => ReplyCode::PARAMETER_NOT_IMPLEMENTED,
            Self::AuthFailed => ReplyCode::AUTH_FAILED,
            Self::AuthRequired => ReplyCode::AUTH_REQUIRED,
            Self::TooManyRecipients(_) => ReplyCode::INSUFFICIENT_STORAGE,
            Self::MessageTooLarge(_) => ReplyCode::EXCEEDED_STORAGE,
            Self::NoRecipients | Self::Mime(_) | Self::Send(_) => ReplyCode::TRANSACTION_FAILED,
        }
    }

    /// Builds the reply sent to the client for this error.
    #[must_use]
    pub fn to_reply(&self) -> Reply {
        let text = match self {
            Self::Io(_) | Self::Timeout => "4.4.2 Connection timed out".to_string(),
            Self::LineTooLong => "5.5.2 Line too long".to_string(),
            Self::UnknownCommand(cmd) => format!("5.5.2 Command not recognized: {cmd}"),
            Self::Syntax(msg) => format!("5.5.4 {msg}"),
            Self::InvalidAddress(addr) => format!("5.1.3 Invalid address: {addr}"),
            Self::BadSequence(msg) => format!("5.5.1 {msg}"),
            Self::UnsupportedMechanism(_) => "5.5.4 Only AUTH PLAIN is supported".to_string(),
            Self::AuthFailed => "5.7.8 Authentication credentials invalid".to_string(),
            Self::AuthRequired => "5.7.0 Authentication required".to_string(),
            Self::TooManyRecipients(max) => format!("4.5.3 Too many recipients (max {max})"),
            Self::MessageTooLarge(max) => format!("5.3.4 Message exceeds {max} bytes"),
            Self::NoRecipients => "5.5.1 No valid recipients".to_string(),
            Self::Mime(_) => "5.6.0 Message could not be parsed".to_string(),
            Self::Send(_) => "5.3.0 Message could not be delivered".to_string(),
        };
        Reply::single(self.reply_code(), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_codes() {
        assert_eq!(Error::AuthFailed.reply_code().as_u16(), 535);
        assert_eq!(Error::AuthRequired.reply_code().as_u16(), 530);
        assert_eq!(Error::UnsupportedMechanism("LOGIN".into()).reply_code().as_u16(), 504);
        assert_eq!(Error::TooManyRecipients(50).reply_code().as_u16(), 452);
        assert_eq!(Error::MessageTooLarge(10).reply_code().as_u16(), 552);
        assert_eq!(Error::NoRecipients.reply_code().as_u16(), 554);
        assert_eq!(Error::UnknownCommand("VRFY".into()).reply_code().as_u16(), 502);
        assert_eq!(Error::BadSequence("x".into()).reply_code().as_u16(), 503);
        assert_eq!(Error::Syntax("x".into()).reply_code().as_u16(), 501);
        assert_eq!(Error::Send("boom".into()).reply_code().as_u16(), 554);
    }

    #[test]
    fn test_to_reply_text() {
        let reply = Error::TooManyRecipients(50).to_reply();
        assert_eq!(reply.message_text(), "4.5.3 Too many recipients (max 50)");
        assert!(reply.is_transient_error());
    }

    #[test]
    fn test_connection_errors() {
        assert!(Error::Timeout.is_connection_error());
        assert!(Error::Io(io::Error::other("reset")).is_connection_error());
        assert!(!Error::LineTooLong.is_connection_error());
        assert!(!Error::AuthFailed.is_connection_error());
    }
}
