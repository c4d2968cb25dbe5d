//! Argument parsers for client commands.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};
use crate::types::Address;

/// Reverse or forward path from a MAIL FROM / RCPT TO command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// The address inside the angle brackets; `None` for the null path `<>`.
    pub address: Option<Address>,
    /// ESMTP parameters following the path (e.g. `SIZE=1024`).
    pub params: Vec<String>,
}

impl Path {
    /// Returns the value of an ESMTP parameter, matched case-insensitively.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find_map(|p| {
            let (key, value) = p.split_once('=')?;
            key.eq_ignore_ascii_case(name).then_some(value)
        })
    }
}

/// Parses the arguments of `MAIL` or `RCPT`.
///
/// `keyword` is `FROM:` or `TO:`. Both `FROM:<a@b>` and `FROM: <a@b>` are
/// accepted, as is a bare address without brackets.
///
/// # Errors
///
/// Returns [`Error::Syntax`] if the keyword or brackets are malformed and
/// [`Error::InvalidAddress`] if the address fails validation.
pub fn parse_path(args: &str, keyword: &str) -> Result<Path> {
    let head = args.get(..keyword.len()).unwrap_or_default();
    if !head.eq_ignore_ascii_case(keyword) {
        return Err(Error::Syntax(format!("expected {keyword}<address>")));
    }

    let rest = args[keyword.len()..].trim_start();
    let (raw, params) = if let Some(inner) = rest.strip_prefix('<') {
        let close = inner
            .find('>')
            .ok_or_else(|| Error::Syntax("missing '>' in path".into()))?;
        (&inner[..close], &inner[close + 1..])
    } else {
        rest.split_once(' ').unwrap_or((rest, ""))
    };

    // source routes (@a,@b:user@host) are obsolete; keep the mailbox only
    let raw = raw.rsplit_once(':').map_or(raw, |(_, mailbox)| mailbox).trim();

    let address = if raw.is_empty() {
        None
    } else {
        Some(Address::new(raw)?)
    };

    Ok(Path {
        address,
        params: params.split_whitespace().map(str::to_string).collect(),
    })
}

/// Credentials decoded from a SASL PLAIN response.
#[derive(Clone, PartialEq, Eq)]
pub struct PlainCredentials {
    /// Authorization identity; usually empty.
    pub authzid: String,
    /// Authentication identity.
    pub username: String,
    /// Password.
    pub password: String,
}

impl std::fmt::Debug for PlainCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainCredentials")
            .field("authzid", &self.authzid)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Decodes a base64 SASL PLAIN response: `authzid NUL username NUL password`.
///
/// # Errors
///
/// Returns [`Error::Syntax`] if the response is not valid base64, not UTF-8,
/// or does not contain exactly three NUL-separated fields.
pub fn decode_plain(response: &str) -> Result<PlainCredentials> {
    let decoded = STANDARD
        .decode(response.trim())
        .map_err(|_| Error::Syntax("invalid base64 in AUTH response".into()))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| Error::Syntax("AUTH response is not UTF-8".into()))?;

    let mut fields = decoded.split('\0');
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(authzid), Some(username), Some(password), None) if !username.is_empty() => {
            Ok(PlainCredentials {
                authzid: authzid.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        _ => Err(Error::Syntax("malformed PLAIN response".into())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_variants() {
        let path = parse_path("FROM:<sender@example.com>", "FROM:").unwrap();
        assert_eq!(path.address.unwrap().as_str(), "sender@example.com");
        assert!(path.params.is_empty());

        let path = parse_path("to: <rcpt@example.com>", "TO:").unwrap();
        assert_eq!(path.address.unwrap().as_str(), "rcpt@example.com");

        let path = parse_path("TO:bare@example.com", "TO:").unwrap();
        assert_eq!(path.address.unwrap().as_str(), "bare@example.com");
    }

    #[test]
    fn test_null_reverse_path() {
        let path = parse_path("FROM:<>", "FROM:").unwrap();
        assert!(path.address.is_none());
    }

    #[test]
    fn test_esmtp_params() {
        let path = parse_path("FROM:<a@example.com> SIZE=2048 BODY=8BITMIME", "FROM:").unwrap();
        assert_eq!(path.params, vec!["SIZE=2048", "BODY=8BITMIME"]);
        assert_eq!(path.param("size"), Some("2048"));
        assert_eq!(path.param("AUTH"), None);
    }

    #[test]
    fn test_source_route_is_dropped() {
        let path = parse_path("TO:<@relay.example:user@example.com>", "TO:").unwrap();
        assert_eq!(path.address.unwrap().as_str(), "user@example.com");
    }

    #[test]
    fn test_parse_path_errors() {
        assert!(matches!(parse_path("<a@example.com>", "FROM:"), Err(Error::Syntax(_))));
        assert!(matches!(parse_path("FROM:<a@example.com", "FROM:"), Err(Error::Syntax(_))));
        assert!(matches!(parse_path("TO:<nope>", "TO:"), Err(Error::InvalidAddress(_))));
        assert!(parse_path("", "TO:").is_err());
    }

    #[test]
    fn test_decode_plain() {
        // "\0user\0pass"
        let creds = decode_plain("AHVzZXIAcGFzcw==").unwrap();
        assert_eq!(creds.authzid, "");
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pass");
        assert!(!format!("{creds:?}").contains("pass\""));
    }

    #[test]
    fn test_decode_plain_with_authzid() {
        let encoded = STANDARD.encode("admin\0user\0secret");
        let creds = decode_plain(&encoded).unwrap();
        assert_eq!(creds.authzid, "admin");
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_decode_plain_errors() {
        assert!(decode_plain("not base64!").is_err());
        assert!(decode_plain(&STANDARD.encode("user\0pass")).is_err());
        assert!(decode_plain(&STANDARD.encode("a\0b\0c\0d")).is_err());
        assert!(decode_plain(&STANDARD.encode("\0\0pass")).is_err());
    }
}
