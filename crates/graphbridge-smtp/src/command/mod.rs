//! Client command parsing.

use crate::error::{Error, Result};
use crate::parser::{Path, parse_path};
use crate::types::AuthMechanism;

/// Command received from an SMTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (optional, for SASL-IR)
        initial_response: Option<String>,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom(Path),
    /// RCPT TO - Add recipient
    RcptTo(Path),
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
    /// Any verb the gateway does not implement (STARTTLS, VRFY, ...).
    Unknown(String),
}

impl Command {
    /// Parses one command line, without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] for an empty line or malformed arguments,
    /// [`Error::InvalidAddress`] for a bad path and
    /// [`Error::UnsupportedMechanism`] for an unknown SASL mechanism.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(Error::Syntax("empty command".into()));
        }

        let (verb, args) = line.split_once(' ').unwrap_or((line, ""));
        let args = args.trim();

        match verb.to_ascii_uppercase().as_str() {
            "HELO" => Ok(Self::Helo {
                hostname: required(args, "HELO requires a domain")?,
            }),
            "EHLO" => Ok(Self::Ehlo {
                hostname: required(args, "EHLO requires a domain")?,
            }),
            "AUTH" => parse_auth(args),
            "MAIL" => parse_path(args, "FROM:").map(Self::MailFrom),
            "RCPT" => {
                let path = parse_path(args, "TO:")?;
                if path.address.is_none() {
                    return Err(Error::InvalidAddress("empty forward path".into()));
                }
                Ok(Self::RcptTo(path))
            }
            "DATA" if args.is_empty() => Ok(Self::Data),
            "DATA" => Err(Error::Syntax("DATA takes no arguments".into())),
            "RSET" => Ok(Self::Rset),
            "NOOP" => Ok(Self::Noop),
            "QUIT" => Ok(Self::Quit),
            other => Ok(Self::Unknown(other.to_string())),
        }
    }
}

fn required(args: &str, message: &str) -> Result<String> {
    if args.is_empty() {
        return Err(Error::Syntax(message.into()));
    }
    Ok(args.to_string())
}

fn parse_auth(args: &str) -> Result<Command> {
    let mut parts = args.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| Error::Syntax("AUTH requires a mechanism".into()))?;
    let mechanism =
        AuthMechanism::parse(name).ok_or_else(|| Error::UnsupportedMechanism(name.to_string()))?;
    let initial_response = parts.next().map(str::to_string);
    if parts.next().is_some() {
        return Err(Error::Syntax("too many AUTH arguments".into()));
    }

    Ok(Command::Auth {
        mechanism,
        initial_response,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings() {
        assert_eq!(
            Command::parse("EHLO client.example.com").unwrap(),
            Command::Ehlo {
                hostname: "client.example.com".into()
            }
        );
        assert_eq!(
            Command::parse("helo client").unwrap(),
            Command::Helo {
                hostname: "client".into()
            }
        );
        assert!(matches!(Command::parse("EHLO"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_auth_plain_with_initial_response() {
        assert_eq!(
            Command::parse("AUTH PLAIN AHVzZXIAcGFzcw==").unwrap(),
            Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some("AHVzZXIAcGFzcw==".into()),
            }
        );
        assert_eq!(
            Command::parse("auth plain").unwrap(),
            Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: None,
            }
        );
    }

    #[test]
    fn test_auth_errors() {
        assert!(matches!(Command::parse("AUTH"), Err(Error::Syntax(_))));
        assert!(matches!(
            Command::parse("AUTH GSSAPI"),
            Err(Error::UnsupportedMechanism(_))
        ));
        // LOGIN parses; the session rejects it
        assert!(matches!(
            Command::parse("AUTH LOGIN").unwrap(),
            Command::Auth {
                mechanism: AuthMechanism::Login,
                ..
            }
        ));
    }

    #[test]
    fn test_mail_and_rcpt() {
        let Command::MailFrom(path) = Command::parse("MAIL FROM:<a@example.com> SIZE=10").unwrap()
        else {
            panic!("expected MAIL");
        };
        assert_eq!(path.address.as_ref().unwrap().as_str(), "a@example.com");
        assert_eq!(path.param("SIZE"), Some("10"));

        let Command::RcptTo(path) = Command::parse("RCPT TO:<b@example.com>").unwrap() else {
            panic!("expected RCPT");
        };
        assert_eq!(path.address.unwrap().as_str(), "b@example.com");

        assert!(Command::parse("RCPT TO:<>").is_err());
        assert!(matches!(Command::parse("MAIL <a@example.com>"), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_simple_verbs() {
        assert_eq!(Command::parse("DATA").unwrap(), Command::Data);
        assert_eq!(Command::parse("rset").unwrap(), Command::Rset);
        assert_eq!(Command::parse("NOOP ignored").unwrap(), Command::Noop);
        assert_eq!(Command::parse("QUIT\r\n").unwrap(), Command::Quit);
        assert!(Command::parse("DATA now").is_err());
        assert!(Command::parse("   ").is_err());
    }

    #[test]
    fn test_unimplemented_verbs() {
        assert_eq!(
            Command::parse("STARTTLS").unwrap(),
            Command::Unknown("STARTTLS".into())
        );
        assert_eq!(
            Command::parse("vrfy postmaster").unwrap(),
            Command::Unknown("VRFY".into())
        );
    }
}
