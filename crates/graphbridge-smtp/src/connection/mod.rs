//! Server-side connection handling.

mod handler;
mod stream;

pub use handler::serve_connection;
pub use stream::{MAX_COMMAND_LENGTH, SmtpStream};
