//! MIME header handling.

use crate::encoding::decode_header_lossy;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Collection of email headers with case-insensitive names.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.entry(name).or_default().push(value);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Gets the first value with RFC 2047 encoded words decoded.
    ///
    /// Values that fail to decode are returned as-is.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_header_lossy)
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Parses a header block.
    ///
    /// Lines starting with a space or tab continue the previous header.
    /// Parsing stops at the first empty line. Non-UTF-8 bytes are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error for a line that is neither a continuation nor a
    /// `Name: value` pair.
    pub fn parse(block: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(block);
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                match current.as_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                    None => {
                        return Err(Error::InvalidHeader(format!(
                            "continuation before first header: {line:?}"
                        )));
                    }
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(format!("missing colon: {line:?}")))?;
            let name = name.trim_end();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(Error::InvalidHeader(format!("bad header name: {line:?}")));
            }
            current = Some((name.to_string(), value.trim().to_string()));
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        Ok(headers)
    }
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
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_headers_multiple_values() {
        let mut headers = Headers::new();
        headers.add("Received", "a");
        headers.add("received", "b");
        assert_eq!(headers.get_all("RECEIVED"), vec!["a", "b"]);
        assert_eq!(headers.get("Received"), Some("a"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            "\tcharset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text.as_bytes()).unwrap();
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(headers.get("Body").is_none());
    }

    #[test]
    fn test_headers_parse_bare_lf() {
        let headers = Headers::parse(b"Subject: hi\nCc: a@b.c\n\nbody").unwrap();
        assert_eq!(headers.get("subject"), Some("hi"));
        assert_eq!(headers.get("cc"), Some("a@b.c"));
    }

    #[test]
    fn test_headers_parse_malformed() {
        assert!(Headers::parse(b"this is not a header\r\n").is_err());
        assert!(Headers::parse(b" leading continuation\r\n").is_err());
        assert!(Headers::parse(b"Bad Name: x\r\n").is_err());
    }

    #[test]
    fn test_headers_parse_empty() {
        assert!(Headers::parse(b"").unwrap().is_empty());
    }

    #[test]
    fn test_get_decoded() {
        let headers = Headers::parse(b"Subject: =?utf-8?B?SMOpbGxv?=\r\n").unwrap();
        assert_eq!(headers.get_decoded("subject").as_deref(), Some("Héllo"));
        assert_eq!(headers.get_decoded("missing"), None);
    }
}
