//! MIME decoding utilities.
//!
//! Base64 and Quoted-Printable transfer decoding, RFC 2047 encoded-word
//! header decoding and charset conversion to UTF-8.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045) line by line.
///
/// A line ending in `=` is a soft break and joins the next line. Every other
/// line ends with `\n`, except a final line with no terminator. `=XX` with two
/// hex digits becomes that byte; anything else passes through unchanged.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut lines = data.split(|&b| b == b'\n').peekable();

    while let Some(raw) = lines.next() {
        let terminated = lines.peek().is_some();
        if !terminated && raw.is_empty() {
            break;
        }

        let line = raw.strip_suffix(b"\r").unwrap_or(raw);
        let (line, soft_break) = match line.strip_suffix(b"=") {
            Some(stripped) => (stripped, true),
            None => (line, false),
        };

        decode_qp_line(line, &mut out);

        if terminated && !soft_break {
            out.push(b'\n');
        }
    }

    out
}

fn decode_qp_line(line: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < line.len() {
        if line[i] == b'=' {
            if let Some(byte) = line
                .get(i + 1)
                .and_then(|&hi| hex_pair(hi, line.get(i + 2).copied()))
            {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(line[i]);
        i += 1;
    }
}

fn hex_pair(hi: u8, lo: Option<u8>) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo? as char).to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

/// Converts text bytes in the given charset to UTF-8.
///
/// Supports UTF-8, US-ASCII and ISO-8859-1 (plus its common aliases).
/// Invalid sequences become U+FFFD.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCharset`] for any other charset.
pub fn decode_charset(data: &[u8], charset: &str) -> Result<String> {
    match charset.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(String::from_utf8_lossy(data).into_owned()),
        "us-ascii" | "ascii" => Ok(data
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
            .collect()),
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => {
            Ok(data.iter().map(|&b| char::from(b)).collect())
        }
        other => Err(Error::UnsupportedCharset(other.to_string())),
    }
}

/// Converts body bytes to text, honoring a charset parameter when known.
///
/// Falls back to lossy UTF-8 for missing or unsupported charsets.
#[must_use]
pub fn decode_text(data: &[u8], charset: Option<&str>) -> String {
    charset
        .and_then(|cs| decode_charset(data, cs).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(data).into_owned())
}

/// Decodes the payload of a single encoded word (`B` or `Q`).
fn decode_word(encoding: u8, text: &str) -> Result<Vec<u8>> {
    match encoding.to_ascii_uppercase() {
        b'B' => STANDARD.decode(text).map_err(Into::into),
        b'Q' => {
            let bytes = text.as_bytes();
            let mut out = Vec::with_capacity(bytes.len());
            let mut i = 0;
            while i < bytes.len() {
                match bytes[i] {
                    b'_' => {
                        out.push(b' ');
                        i += 1;
                    }
                    b'=' => {
                        let byte = bytes
                            .get(i + 1)
                            .and_then(|&hi| hex_pair(hi, bytes.get(i + 2).copied()))
                            .ok_or_else(|| {
                                Error::InvalidEncoding(format!("bad escape in Q word: {text}"))
                            })?;
                        out.push(byte);
                        i += 3;
                    }
                    b => {
                        out.push(b);
                        i += 1;
                    }
                }
            }
            Ok(out)
        }
        other => Err(Error::InvalidEncoding(format!(
            "unknown encoded-word encoding: {}",
            other as char
        ))),
    }
}

/// Decodes RFC 2047 encoded words in a header value.
///
/// Whitespace between adjacent encoded words is dropped. Malformed words are
/// kept literally.
///
/// # Errors
///
/// Returns an error if a well-formed word uses an unsupported charset.
pub fn decode_rfc2047(header: &str) -> Result<String> {
    let Some(first) = header.find("=?") else {
        return Ok(header.to_string());
    };

    let mut out = String::with_capacity(header.len());
    out.push_str(&header[..first]);
    let mut rest = &header[first..];
    let mut between_words = false;

    while let Some(start) = rest.find("=?") {
        let Some(word) = parse_encoded_word(&rest[start..]) else {
            break;
        };

        let Ok(content) = decode_word(word.encoding, word.text) else {
            between_words = false;
            out.push_str(&rest[..start + 2]);
            rest = &rest[start + 2..];
            continue;
        };

        let gap = &rest[..start];
        if !gap.is_empty() && (!between_words || gap.chars().any(|c| !c.is_whitespace())) {
            out.push_str(gap);
        }

        out.push_str(&decode_charset(&content, word.charset)?);
        rest = &rest[start + word.len..];
        between_words = true;
    }

    out.push_str(rest);
    Ok(out)
}

/// Decodes a header value, returning it unchanged if decoding fails.
#[must_use]
pub fn decode_header_lossy(header: &str) -> String {
    decode_rfc2047(header).unwrap_or_else(|_| header.to_string())
}

struct EncodedWord<'a> {
    charset: &'a str,
    encoding: u8,
    text: &'a str,
    len: usize,
}

/// Parses `=?charset?X?text?=` at the start of `s`.
fn parse_encoded_word(s: &str) -> Option<EncodedWord<'_>> {
    let body = s.strip_prefix("=?")?;
    let (charset, after_charset) = body.split_once('?')?;
    let mut bytes = after_charset.bytes();
    let encoding = bytes.next()?;
    if bytes.next()? != b'?' {
        return None;
    }
    let payload = &after_charset[2..];
    let end = payload.find("?=")?;
    let text = &payload[..end];

    Some(EncodedWord {
        charset,
        encoding,
        text,
        len: 2 + charset.len() + 1 + 2 + end + 2,
    })
}
