//! # graphbridge-mime
//!
//! Decoding of submitted RFC 822 messages into a forwardable body.
//!
//! ## Features
//!
//! - **Message parsing**: header block, raw body, top-level multipart parts
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Address lists**: Cc/To style lists with display names
//! - **Extraction**: one body per message, HTML preferred over plain text
//!
//! ## Quick Start
//!
//! ```ignore
//! use graphbridge_mime::{ExtractedMessage, Message};
//!
//! let raw = b"Subject: =?utf-8?Q?Caf=C3=A9?=\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! let (extracted, _error) = ExtractedMessage::from_message(&message);
//! println!("{}: {}", extracted.subject, extracted.body);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod extract;
mod header;
mod message;

pub mod encoding;

pub use address::{Mailbox, parse_address_list};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use extract::{ExtractedMessage, PLACEHOLDER_BODY, extract};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding, split_multipart};
