//! RFC 822 message structure and multipart splitting.

use crate::address::{Mailbox, parse_address_list};
use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Decodes `data` with this encoding.
    ///
    /// Identity encodings pass through. Base64 that fails to decode also
    /// passes through as raw bytes.
    #[must_use]
    pub fn decode(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => decode_base64(data).unwrap_or_else(|_| data.to_vec()),
            Self::QuotedPrintable => decode_quoted_printable(data),
            Self::SevenBit | Self::EightBit | Self::Binary => data.to_vec(),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Splits raw entity bytes at the first empty line.
///
/// Without an empty line, everything is header and the body is empty.
fn split_entity(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < raw.len() {
        let end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| pos + i);
        let line = &raw[pos..end];
        let next = (end + 1).min(raw.len());

        if line.is_empty() || line == b"\r" {
            return (&raw[..pos], &raw[next..]);
        }
        pos = next;
    }
    (raw, &[])
}

/// Shared header accessors for messages and parts.
fn content_type_of(headers: &Headers) -> Result<ContentType> {
    headers
        .get("content-type")
        .ok_or_else(|| Error::MissingHeader("Content-Type".to_string()))
        .and_then(ContentType::parse)
}

fn transfer_encoding_of(headers: &Headers) -> TransferEncoding {
    headers
        .get("content-transfer-encoding")
        .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
}

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw bytes).
    pub body: Vec<u8>,
}

impl Part {
    /// Parses a part from the bytes between two boundary delimiters.
    ///
    /// # Errors
    ///
    /// Returns an error if the part headers are malformed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_entity(raw);
        Ok(Self {
            headers: Headers::parse(head)?,
            body: body.to_vec(),
        })
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing or invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        content_type_of(&self.headers)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        transfer_encoding_of(&self.headers)
    }

    /// Decodes the body according to the transfer encoding.
    #[must_use]
    pub fn decode_body(&self) -> Vec<u8> {
        self.transfer_encoding().decode(&self.body)
    }
}

/// Parsed RFC 822 message: headers and the raw body.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Raw body bytes after the header block.
    pub body: Vec<u8>,
}

impl Message {
    /// Parses a message as received in an SMTP DATA transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the header block is malformed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_entity(raw);
        Ok(Self {
            headers: Headers::parse(head)?,
            body: body.to_vec(),
        })
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing or invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        content_type_of(&self.headers)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        transfer_encoding_of(&self.headers)
    }

    /// Gets the Subject with encoded words decoded, or an empty string.
    #[must_use]
    pub fn subject(&self) -> String {
        self.headers.get_decoded("subject").unwrap_or_default()
    }

    /// Parses the Cc header. A missing or blank header gives an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is present but not a valid address
    /// list.
    pub fn cc(&self) -> Result<Vec<Mailbox>> {
        match self.headers.get("cc").map(str::trim) {
            None | Some("") => Ok(Vec::new()),
            Some(value) => parse_address_list(value),
        }
    }

    /// Splits a multipart body into its top-level parts.
    ///
    /// Text before the first delimiter is ignored. A missing closing
    /// delimiter ends the last part at the end of the body.
    ///
    /// # Errors
    ///
    /// Returns an error if no delimiter line is found or a part has
    /// malformed headers.
    pub fn parts(&self, boundary: &str) -> Result<Vec<Part>> {
        split_multipart(&self.body, boundary)
    }
}

/// Splits `body` on `--boundary` delimiter lines.
///
/// The line break before each delimiter belongs to the delimiter.
///
/// # Errors
///
/// Returns an error if no delimiter line is found.
pub fn split_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    if boundary.is_empty() {
        return Err(Error::MissingBoundary);
    }

    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut seen_delimiter = false;
    let mut closed = false;
    let mut pos = 0;

    while pos < body.len() {
        let end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (end + 1).min(body.len());
        let line = trim_line_end(&body[pos..end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            if rest.is_empty() || rest == b"--" {
                seen_delimiter = true;
                if let Some(start) = current.take() {
                    parts.push(Part::parse(&body[start..strip_break(body, start, pos)])?);
                }
                if rest == b"--" {
                    closed = true;
                    break;
                }
                current = Some(next);
            }
        }
        pos = next;
    }

    if !closed {
        if let Some(start) = current {
            parts.push(Part::parse(&body[start..])?);
        }
    }

    if !seen_delimiter {
        return Err(Error::InvalidMultipart(format!(
            "no delimiter line for boundary {boundary:?}"
        )));
    }

    Ok(parts)
}

/// Drops trailing spaces, tabs and CR.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let keep = line
        .iter()
        .rposition(|&b| !matches!(b, b' ' | b'\t' | b'\r'))
        .map_or(0, |i| i + 1);
    &line[..keep]
}

/// Returns `end` moved back over the CRLF or LF that precedes a delimiter.
fn strip_break(body: &[u8], start: usize, mut end: usize) -> usize {
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" quoted-printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_bad_base64_passes_through() {
        assert_eq!(TransferEncoding::Base64.decode(b"%%%"), b"%%%");
        assert_eq!(TransferEncoding::Base64.decode(b"SGk=\r\n"), b"Hi");
    }

    #[test]
    fn test_message_parse() {
        let raw = b"From: a@example.com\r\nSubject: Test\r\n\r\nHello, World!\r\n";
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.headers.get("from"), Some("a@example.com"));
        assert_eq!(message.subject(), "Test");
        assert_eq!(message.body, b"Hello, World!\r\n");
        assert!(message.content_type().is_err());
    }

    #[test]
    fn test_message_without_body() {
        let message = Message::parse(b"Subject: only headers\r\n").unwrap();
        assert!(message.body.is_empty());
        assert_eq!(message.subject(), "only headers");
    }

    #[test]
    fn test_message_without_subject() {
        let message = Message::parse(b"To: a@b.c\n\nhi").unwrap();
        assert_eq!(message.subject(), "");
    }

    #[test]
    fn test_message_malformed_headers() {
        assert!(Message::parse(b"no colon here\r\n\r\nbody").is_err());
    }

    #[test]
    fn test_cc_parsing() {
        let message =
            Message::parse(b"Cc: Alice <alice@example.com>, bob@example.com\r\n\r\n").unwrap();
        let cc = message.cc().unwrap();
        assert_eq!(cc.len(), 2);
        assert_eq!(cc[0].address, "alice@example.com");
        assert_eq!(cc[1].address, "bob@example.com");

        let none = Message::parse(b"Cc:   \r\n\r\n").unwrap();
        assert!(none.cc().unwrap().is_empty());

        let bad = Message::parse(b"Cc: <<<\r\n\r\n").unwrap();
        assert!(bad.cc().is_err());
    }

    #[test]
    fn test_split_multipart() {
        let body = concat!(
            "This is the preamble.\r\n",
            "--xyz\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Part one\r\n",
            "--xyz\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>Part two</p>\r\n",
            "--xyz--\r\n",
            "epilogue\r\n"
        );

        let parts = split_multipart(body.as_bytes(), "xyz").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body, b"Part one");
        assert!(parts[0].content_type().unwrap().is_plain_text());
        assert_eq!(parts[1].body, b"<p>Part two</p>");
        assert!(parts[1].content_type().unwrap().is_html());
    }

    #[test]
    fn test_split_multipart_bare_lf_and_padding() {
        let body = "--b  \nContent-Type: text/plain\n\nx\n--b--\n";
        let parts = split_multipart(body.as_bytes(), "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"x");
    }

    #[test]
    fn test_split_multipart_prefix_boundary_not_matched() {
        let body = "--b\r\n\r\none\r\n--bb\r\nstill one\r\n--b--\r\n";
        let parts = split_multipart(body.as_bytes(), "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"one\r\n--bb\r\nstill one");
    }

    #[test]
    fn test_split_multipart_unterminated() {
        let body = "--b\r\nContent-Type: text/plain\r\n\r\ntail";
        let parts = split_multipart(body.as_bytes(), "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"tail");
    }

    #[test]
    fn test_split_multipart_no_delimiter() {
        assert!(matches!(
            split_multipart(b"just text", "b"),
            Err(Error::InvalidMultipart(_))
        ));
        assert!(matches!(
            split_multipart(b"--\r\n", ""),
            Err(Error::MissingBoundary)
        ));
    }

    #[test]
    fn test_part_decode_body() {
        let part = Part::parse(
            b"Content-Type: text/plain\r\nContent-Transfer-Encoding: base64\r\n\r\nSGVs\r\nbG8=\r\n",
        )
        .unwrap();
        assert_eq!(part.transfer_encoding(), TransferEncoding::Base64);
        assert_eq!(part.decode_body(), b"Hello");
    }
}
