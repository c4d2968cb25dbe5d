//! Reduces a submitted message to one displayable body.

use crate::encoding::decode_text;
use crate::error::{Error, Result};
use crate::message::Message;

/// Body used when no text could be extracted from a message.
pub const PLACEHOLDER_BODY: &str = "(message body could not be extracted)";

/// Subject and body of a submitted message, ready to forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMessage {
    /// Subject with encoded words decoded.
    pub subject: String,
    /// Body text or HTML.
    pub body: String,
    /// Whether `body` is HTML.
    pub is_html: bool,
}

/// Extracts the body of a message and whether it is HTML.
///
/// - No parseable Content-Type: the raw body, as plain text.
/// - `multipart/*`: the first `text/html` and the first `text/plain` part are
///   kept; later parts of the same type are ignored even when the first one is
///   empty. HTML wins if non-empty, then plain text. Nested multiparts are
///   skipped.
/// - Anything else: the decoded body; HTML iff the type is `text/html`.
///
/// # Errors
///
/// Returns [`Error::NoBody`] if a multipart message has no text part,
/// [`Error::MissingBoundary`] if it has no boundary, or a parse error for
/// malformed part structure.
pub fn extract(message: &Message) -> Result<(String, bool)> {
    let Ok(content_type) = message.content_type() else {
        return Ok((String::from_utf8_lossy(&message.body).into_owned(), false));
    };

    if content_type.is_multipart() {
        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        return extract_multipart(message, boundary);
    }

    let decoded = message.transfer_encoding().decode(&message.body);
    Ok((
        decode_text(&decoded, content_type.charset()),
        content_type.is_html(),
    ))
}

fn extract_multipart(message: &Message, boundary: &str) -> Result<(String, bool)> {
    let mut plain: Option<String> = None;
    let mut html: Option<String> = None;

    for part in message.parts(boundary)? {
        // parts without a usable Content-Type are not text bodies
        let Ok(content_type) = part.content_type() else {
            continue;
        };

        let slot = if content_type.is_html() {
            &mut html
        } else if content_type.is_plain_text() {
            &mut plain
        } else {
            continue;
        };

        if slot.is_none() {
            *slot = Some(decode_text(&part.decode_body(), content_type.charset()));
        }
    }

    html.filter(|body| !body.is_empty())
        .map(|body| (body, true))
        .or_else(|| plain.filter(|body| !body.is_empty()).map(|body| (body, false)))
        .ok_or(Error::NoBody)
}

impl ExtractedMessage {
    /// Builds the forwardable form of a message.
    ///
    /// Falls back to [`PLACEHOLDER_BODY`] as plain text when extraction
    /// fails; the failure is returned alongside so the caller can report it.
    #[must_use]
    pub fn from_message(message: &Message) -> (Self, Option<Error>) {
        let subject = message.subject();
        match extract(message) {
            Ok((body, is_html)) => (
                Self {
                    subject,
                    body,
                    is_html,
                },
                None,
            ),
            Err(e) => (
                Self {
                    subject,
                    body: PLACEHOLDER_BODY.to_string(),
                    is_html: false,
                },
                Some(e),
            ),
        }
    }
}
