//! Per-connection SMTP session state.

use std::sync::Arc;

use graphbridge_mime::{ExtractedMessage, Message};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::sender::MailSender;
use crate::types::Address;

/// Default recipient limit per transaction.
pub const DEFAULT_MAX_RECIPIENTS: usize = 50;

/// Shared state for all sessions: credentials and the mail sender.
pub struct Backend<S> {
    username: String,
    password: String,
    sender: Arc<S>,
    max_recipients: usize,
}

impl<S: MailSender> Backend<S> {
    /// Creates a backend. Empty credentials disable authentication.
    pub fn new(username: impl Into<String>, password: impl Into<String>, sender: Arc<S>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            sender,
            max_recipients: DEFAULT_MAX_RECIPIENTS,
        }
    }

    /// Sets the recipient limit.
    #[must_use]
    pub const fn with_max_recipients(mut self, max: usize) -> Self {
        self.max_recipients = max;
        self
    }

    /// Whether clients must authenticate before MAIL.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Returns the recipient limit.
    #[must_use]
    pub const fn max_recipients(&self) -> usize {
        self.max_recipients
    }

    /// Starts a session for a newly accepted connection.
    #[must_use]
    pub fn new_session(self: &Arc<Self>) -> Session<S> {
        debug!("new SMTP session");
        Session {
            backend: Arc::clone(self),
            from: None,
            to: Vec::new(),
            authenticated: false,
        }
    }

    fn credentials_match(&self, username: &str, password: &str) -> bool {
        // evaluate both so timing does not reveal which one differed
        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        user_ok & pass_ok
    }
}

impl<S> std::fmt::Debug for Backend<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("max_recipients", &self.max_recipients)
            .finish_non_exhaustive()
    }
}

/// Envelope and authentication state of one connection.
///
/// The envelope is cleared by [`reset`](Self::reset) and after every DATA
/// transaction; the authenticated flag lives until the connection closes.
pub struct Session<S> {
    backend: Arc<Backend<S>>,
    from: Option<Option<Address>>,
    to: Vec<String>,
    authenticated: bool,
}

impl<S: MailSender> Session<S> {
    /// Checks PLAIN credentials against the configured pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadSequence`] if already authenticated or
    /// [`Error::AuthFailed`] on mismatch.
    pub fn auth_plain(&mut self, username: &str, password: &str) -> Result<()> {
        if self.authenticated {
            return Err(Error::BadSequence("already authenticated".into()));
        }
        if !self.backend.credentials_match(username, password) {
            warn!(username, "authentication failed");
            return Err(Error::AuthFailed);
        }

        debug!(username, "authentication succeeded");
        self.authenticated = true;
        Ok(())
    }

    /// Starts a transaction. `None` is the null reverse path `<>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthRequired`] if credentials are configured and the
    /// client has not authenticated, or [`Error::BadSequence`] if a
    /// transaction is already open.
    pub fn mail(&mut self, from: Option<Address>) -> Result<()> {
        if self.backend.requires_auth() && !self.authenticated {
            return Err(Error::AuthRequired);
        }
        if self.from.is_some() {
            return Err(Error::BadSequence("nested MAIL command".into()));
        }

        debug!(from = ?from.as_ref().map(Address::as_str), "sender set");
        self.from = Some(from);
        Ok(())
    }

    /// Adds a recipient. Order is kept and duplicates are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadSequence`] before MAIL, or
    /// [`Error::TooManyRecipients`] once the limit is reached.
    pub fn rcpt(&mut self, to: Address) -> Result<()> {
        if self.from.is_none() {
            return Err(Error::BadSequence("need MAIL before RCPT".into()));
        }
        let max = self.backend.max_recipients;
        if self.to.len() >= max {
            return Err(Error::TooManyRecipients(max));
        }

        debug!(to = to.as_str(), "recipient added");
        self.to.push(to.into_string());
        Ok(())
    }

    /// Delivers a complete message and resets the envelope, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] without calling the sender when no
    /// RCPT was accepted, [`Error::Mime`] if the header block does not
    /// parse, or [`Error::Send`] if the sender fails.
    pub async fn data(&mut self, raw: &[u8]) -> Result<()> {
        let result = self.deliver(raw).await;
        self.reset();
        result
    }

    async fn deliver(&self, raw: &[u8]) -> Result<()> {
        let Some(first) = self.to.first() else {
            return Err(Error::NoRecipients);
        };

        let message = Message::parse(raw)?;

        let cc: Vec<String> = match message.cc() {
            Ok(list) => list.into_iter().map(|m| m.address).collect(),
            Err(e) => {
                debug!(error = %e, "ignoring unparsable Cc header");
                Vec::new()
            }
        };

        let (extracted, extract_error) = ExtractedMessage::from_message(&message);
        if let Some(e) = extract_error {
            warn!(error = %e, "body extraction failed, sending placeholder");
        }

        debug!(
            subject = %extracted.subject,
            to_count = self.to.len(),
            cc_count = cc.len(),
            length = extracted.body.len(),
            is_html = extracted.is_html,
            "message parsed"
        );

        let sender = &self.backend.sender;
        let sent = if cc.is_empty() {
            // single-recipient path: only the first RCPT is used
            sender
                .send_mail(first, &extracted.subject, &extracted.body, extracted.is_html)
                .await
        } else {
            sender
                .send_mail_multiple(
                    &self.to,
                    &cc,
                    &extracted.subject,
                    &extracted.body,
                    extracted.is_html,
                )
                .await
        };
        sent.map_err(|e| Error::Send(Box::new(e)))?;

        info!(
            subject = %extracted.subject,
            to_count = self.to.len(),
            cc_count = cc.len(),
            "message sent"
        );
        Ok(())
    }

    /// Clears the sender and recipients.
    pub fn reset(&mut self) {
        self.from = None;
        self.to.clear();
        debug!("session reset");
    }

    /// Ends the session.
    pub fn logout(&mut self) {
        self.reset();
        debug!("session closed");
    }

    /// Whether a MAIL command has opened a transaction.
    #[must_use]
    pub const fn has_sender(&self) -> bool {
        self.from.is_some()
    }

    /// Returns the envelope sender; `None` for the null path or no MAIL yet.
    #[must_use]
    pub fn sender(&self) -> Option<&Address> {
        self.from.as_ref().and_then(Option::as_ref)
    }

    /// Returns the recipients in the order they were added.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.to
    }

    /// Whether the client has authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns the backend this session belongs to.
    #[must_use]
    pub const fn backend(&self) -> &Arc<Backend<S>> {
        &self.backend
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (&x, &y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
