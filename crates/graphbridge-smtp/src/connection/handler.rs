//! Drives one client connection through the SMTP dialogue.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use super::stream::SmtpStream;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{Path, decode_plain};
use crate::sender::MailSender;
use crate::server::ServerConfig;
use crate::session::Session;
use crate::types::{AuthMechanism, Extension, Reply, ReplyCode};

enum Flow {
    Continue,
    Close,
}

/// Serves one connection until QUIT, disconnect or a timeout.
///
/// Protocol errors are answered with the matching reply and the dialogue
/// continues. A read timeout is answered with `421` before closing.
///
/// # Errors
///
/// Returns an I/O or timeout error if the connection broke. A client that
/// simply disconnects is not an error.
pub async fn serve_connection<IO, S>(
    io: IO,
    session: Session<S>,
    config: &ServerConfig,
) -> Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    S: MailSender,
{
    let mut conn = Connection {
        stream: SmtpStream::new(io, config.read_timeout, config.write_timeout),
        session,
        config,
        greeted: false,
    };

    let result = conn.run().await;
    conn.session.logout();

    match result {
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
            debug!("client disconnected");
            Ok(())
        }
        Err(Error::Timeout) => {
            // best effort; the client may already be gone
            let _ = conn.stream.write_reply(&Error::Timeout.to_reply()).await;
            Err(Error::Timeout)
        }
        other => other,
    }
}

struct Connection<'a, IO, S> {
    stream: SmtpStream<IO>,
    session: Session<S>,
    config: &'a ServerConfig,
    greeted: bool,
}

impl<IO, S> Connection<'_, IO, S>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    S: MailSender,
{
    async fn run(&mut self) -> Result<()> {
        let greeting = format!("{} ESMTP graphbridge ready", self.config.domain);
        self.reply(ReplyCode::SERVICE_READY, greeting).await?;

        loop {
            let outcome = match self.stream.read_line().await {
                Ok(line) => {
                    trace!(line = %redact(&line), "command received");
                    match Command::parse(&line) {
                        Ok(command) => self.dispatch(command).await,
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => return Ok(()),
                Err(e) if e.is_connection_error() => return Err(e),
                Err(e) => {
                    debug!(error = %e, "command rejected");
                    self.stream.write_reply(&e.to_reply()).await?;
                }
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Helo { hostname } => {
                self.greet();
                let text = format!("{} Hello {hostname}", self.config.domain);
                self.reply(ReplyCode::OK, text).await?;
            }
            Command::Ehlo { hostname } => {
                self.greet();
                let lines = vec![
                    format!("{} Hello {hostname}", self.config.domain),
                    Extension::Auth(vec![AuthMechanism::Plain]).to_string(),
                    Extension::Size(self.config.max_message_bytes).to_string(),
                    Extension::EightBitMime.to_string(),
                ];
                self.stream
                    .write_reply(&Reply::new(ReplyCode::OK, lines))
                    .await?;
            }
            Command::Auth {
                mechanism,
                initial_response,
            } => self.auth(mechanism, initial_response).await?,
            Command::MailFrom(path) => self.mail(path).await?,
            Command::RcptTo(path) => {
                self.require_greeting()?;
                let to = path
                    .address
                    .ok_or_else(|| Error::InvalidAddress("empty forward path".into()))?;
                self.session.rcpt(to)?;
                self.reply(ReplyCode::OK, "2.1.5 Recipient OK").await?;
            }
            Command::Data => self.data().await?,
            Command::Rset => {
                self.session.reset();
                self.reply(ReplyCode::OK, "2.0.0 Flushed").await?;
            }
            Command::Noop => self.reply(ReplyCode::OK, "2.0.0 OK").await?,
            Command::Quit => {
                self.reply(ReplyCode::CLOSING, "2.0.0 Bye").await?;
                return Ok(Flow::Close);
            }
            Command::Unknown(verb) => return Err(Error::UnknownCommand(verb)),
        }
        Ok(Flow::Continue)
    }

    fn greet(&mut self) {
        self.session.reset();
        self.greeted = true;
    }

    fn require_greeting(&self) -> Result<()> {
        if self.greeted {
            Ok(())
        } else {
            Err(Error::BadSequence("send HELO/EHLO first".into()))
        }
    }

    async fn auth(
        &mut self,
        mechanism: AuthMechanism,
        initial_response: Option<String>,
    ) -> Result<()> {
        self.require_greeting()?;
        if self.session.is_authenticated() {
            return Err(Error::BadSequence("already authenticated".into()));
        }
        if self.session.has_sender() {
            return Err(Error::BadSequence("AUTH not allowed during a transaction".into()));
        }
        if mechanism != AuthMechanism::Plain {
            return Err(Error::UnsupportedMechanism(mechanism.as_str().to_string()));
        }

        let response = match initial_response {
            // "=" is an explicitly empty initial response
            Some(r) if r == "=" => String::new(),
            Some(r) => r,
            None => {
                self.reply(ReplyCode::AUTH_CONTINUE, "").await?;
                let line = self.stream.read_line().await?;
                if line.trim() == "*" {
                    return Err(Error::Syntax("authentication cancelled".into()));
                }
                line
            }
        };

        let credentials = decode_plain(&response)?;
        self.session
            .auth_plain(&credentials.username, &credentials.password)?;
        self.reply(ReplyCode::AUTH_SUCCEEDED, "2.7.0 Authentication successful")
            .await
    }

    async fn mail(&mut self, path: Path) -> Result<()> {
        self.require_greeting()?;

        let max = self.config.max_message_bytes;
        if let Some(size) = path.param("SIZE") {
            let size: usize = size
                .parse()
                .map_err(|_| Error::Syntax(format!("invalid SIZE value: {size}")))?;
            if size > max {
                return Err(Error::MessageTooLarge(max));
            }
        }

        self.session.mail(path.address)?;
        self.reply(ReplyCode::OK, "2.1.0 Sender OK").await
    }

    async fn data(&mut self) -> Result<()> {
        if !self.session.has_sender() {
            return Err(Error::BadSequence("need MAIL before DATA".into()));
        }
        if self.session.recipients().is_empty() {
            return Err(Error::NoRecipients);
        }

        self.reply(ReplyCode::START_DATA, "Start mail input; end with <CRLF>.<CRLF>")
            .await?;

        let raw = match self.stream.read_data(self.config.max_message_bytes).await {
            Ok(raw) => raw,
            Err(e) => {
                self.session.reset();
                return Err(e);
            }
        };
        debug!(bytes = raw.len(), "message received");

        self.session.data(&raw).await?;
        self.reply(ReplyCode::OK, "2.0.0 Message accepted for delivery")
            .await
    }

    async fn reply(&mut self, code: ReplyCode, text: impl Into<String>) -> Result<()> {
        self.stream.write_reply(&Reply::single(code, text)).await
    }
}

/// Hides AUTH payloads from trace output.
fn redact(line: &str) -> &str {
    let is_auth = line
        .get(..4)
        .is_some_and(|verb| verb.eq_ignore_ascii_case("AUTH"));
    if is_auth { "AUTH [REDACTED]" } else { line }
}
