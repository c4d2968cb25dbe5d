//! Address list parsing for To/Cc style headers.

use crate::encoding::decode_header_lossy;
use crate::error::{Error, Result};
use std::fmt;

/// A single mailbox from an address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name, if one was given.
    pub name: Option<String>,
    /// Bare `local@domain` address.
    pub address: String,
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "\"{name}\" <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Parses a comma-separated address list.
///
/// Accepts bare addresses, `Name <addr>` and `"Quoted, Name" <addr>` forms.
/// Parenthesized comments are dropped. Display names have RFC 2047 encoded
/// words decoded.
///
/// # Errors
///
/// Returns an error if any entry is empty or not a valid address, or if
/// quotes, brackets or comments are unbalanced.
pub fn parse_address_list(list: &str) -> Result<Vec<Mailbox>> {
    split_entries(list)?
        .into_iter()
        .map(parse_mailbox)
        .collect()
}

/// Splits on commas that are outside quotes, angle brackets and comments.
fn split_entries(list: &str) -> Result<Vec<&str>> {
    let mut entries = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle = 0usize;
    let mut comment = 0usize;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes || comment > 0 => escaped = true,
            '"' if comment == 0 => in_quotes = !in_quotes,
            '(' if !in_quotes => comment += 1,
            ')' if !in_quotes && comment > 0 => comment -= 1,
            '<' if !in_quotes && comment == 0 => angle += 1,
            '>' if !in_quotes && comment == 0 && angle > 0 => angle -= 1,
            ',' if !in_quotes && comment == 0 && angle == 0 => {
                entries.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if in_quotes || angle > 0 || comment > 0 {
        return Err(Error::InvalidAddress(format!("unbalanced address list: {list}")));
    }

    entries.push(&list[start..]);
    Ok(entries)
}

fn parse_mailbox(entry: &str) -> Result<Mailbox> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(Error::InvalidAddress("empty entry in address list".to_string()));
    }

    let Some(open) = find_unquoted(entry, '<') else {
        let address = strip_comments(entry).trim().to_string();
        validate_address(&address)?;
        return Ok(Mailbox {
            name: None,
            address,
        });
    };

    let close = entry[open..]
        .find('>')
        .map(|i| open + i)
        .ok_or_else(|| Error::InvalidAddress(format!("missing '>' in {entry}")))?;

    let trailing = strip_comments(&entry[close + 1..]);
    if !trailing.trim().is_empty() {
        return Err(Error::InvalidAddress(format!("text after address in {entry}")));
    }

    let address = entry[open + 1..close].trim().to_string();
    validate_address(&address)?;

    let name = display_name(&entry[..open]);
    Ok(Mailbox { name, address })
}

fn display_name(raw: &str) -> Option<String> {
    let raw = strip_comments(raw);
    let raw = raw.trim();
    let name = match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => unescape(inner),
        None => raw.to_string(),
    };
    let name = decode_header_lossy(&name);
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn find_unquoted(s: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && in_quotes {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == target && !in_quotes {
            return Some(i);
        }
    }
    None
}

/// Removes parenthesized comments outside quoted strings.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            escaped = false;
            if depth == 0 {
                out.push(c);
            }
            continue;
        }
        match c {
            '\\' if in_quotes || depth > 0 => {
                escaped = true;
                if depth == 0 {
                    out.push(c);
                }
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn validate_address(address: &str) -> Result<()> {
    let invalid = || Error::InvalidAddress(address.to_string());

    let (local, domain) = address.rsplit_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() {
        return Err(invalid());
    }
    if domain
        .chars()
        .any(|c| c.is_whitespace() || "<>()[],;:\"@\\".contains(c))
    {
        return Err(invalid());
    }
    let quoted_local = local.len() >= 2 && local.starts_with('"') && local.ends_with('"');
    if !quoted_local && local.chars().any(|c| c.is_whitespace() || "<>()[],;:\"@\\".contains(c)) {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_addresses() {
        let list = parse_address_list("a@example.com, b@example.org").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].address, "a@example.com");
        assert_eq!(list[0].name, None);
        assert_eq!(list[1].address, "b@example.org");
    }

    #[test]
    fn test_named_addresses() {
        let list =
            parse_address_list("Alice Smith <alice@example.com>, \"Doe, John\" <john@example.com>")
                .unwrap();
        assert_eq!(list[0].name.as_deref(), Some("Alice Smith"));
        assert_eq!(list[0].address, "alice@example.com");
        assert_eq!(list[1].name.as_deref(), Some("Doe, John"));
        assert_eq!(list[1].address, "john@example.com");
    }

    #[test]
    fn test_angle_without_name() {
        let list = parse_address_list("<solo@example.com>").unwrap();
        assert_eq!(list[0].name, None);
        assert_eq!(list[0].address, "solo@example.com");
    }

    #[test]
    fn test_encoded_display_name() {
        let list = parse_address_list("=?utf-8?Q?Ren=C3=A9?= <rene@example.com>").unwrap();
        assert_eq!(list[0].name.as_deref(), Some("René"));
    }

    #[test]
    fn test_comments_are_dropped() {
        let list = parse_address_list("carol@example.com (Carol, at work)").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].address, "carol@example.com");
    }

    #[test]
    fn test_invalid_lists() {
        assert!(parse_address_list("").is_err());
        assert!(parse_address_list("a@example.com,,b@example.com").is_err());
        assert!(parse_address_list("not an address").is_err());
        assert!(parse_address_list("<<<").is_err());
        assert!(parse_address_list("Name <open@example.com").is_err());
        assert!(parse_address_list("\"unterminated <x@example.com>").is_err());
        assert!(parse_address_list("@example.com").is_err());
        assert!(parse_address_list("user@").is_err());
    }

    #[test]
    fn test_mailbox_display() {
        let named = Mailbox {
            name: Some("Alice".to_string()),
            address: "alice@example.com".to_string(),
        };
        assert_eq!(named.to_string(), "\"Alice\" <alice@example.com>");

        let bare = Mailbox {
            name: None,
            address: "bob@example.com".to_string(),
        };
        assert_eq!(bare.to_string(), "bob@example.com");
    }
}
