//! Framed I/O for the server side of an SMTP connection.
//!
//! Commands and DATA content are LF-terminated lines (CRLF on the wire from
//! conforming clients). Every read and write is bounded by a timeout.

use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};
use crate::types::Reply;

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum command line length; long enough for an AUTH PLAIN initial response.
pub const MAX_COMMAND_LENGTH: usize = 4096;

/// Maximum length of a single DATA line.
const MAX_DATA_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Buffered SMTP stream with read and write deadlines.
pub struct SmtpStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<S> SmtpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new stream.
    pub fn new(stream: S, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            read_timeout,
            write_timeout,
        }
    }

    /// Reads one command line with the line ending stripped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no complete line arrives in time,
    /// [`Error::LineTooLong`] for an oversized line (which is discarded), or an
    /// I/O error (`UnexpectedEof` when the client disconnects).
    pub async fn read_line(&mut self) -> Result<String> {
        let line = self.read_raw_line(MAX_COMMAND_LENGTH).await?;
        Ok(String::from_utf8_lossy(strip_line_ending(&line)).into_owned())
    }

    /// Reads DATA content up to the terminating `.` line.
    ///
    /// Leading dots are unstuffed. Once `max_bytes` is exceeded the rest of
    /// the message is still consumed so the connection stays in sync.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] if the content exceeds `max_bytes`,
    /// or a timeout/I/O error.
    pub async fn read_data(&mut self, max_bytes: usize) -> Result<Bytes> {
        let mut data = BytesMut::new();
        let mut too_large = false;

        loop {
            let line = match self.read_raw_line(MAX_DATA_LINE_LENGTH).await {
                Ok(line) => line,
                Err(Error::LineTooLong) => {
                    too_large = true;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if strip_line_ending(&line) == b"." {
                break;
            }
            if too_large {
                continue;
            }

            let content = line.strip_prefix(b".").unwrap_or(&line);
            if data.len() + content.len() > max_bytes {
                too_large = true;
                data.clear();
            } else {
                data.extend_from_slice(content);
            }
        }

        if too_large {
            return Err(Error::MessageTooLarge(max_bytes));
        }
        Ok(data.freeze())
    }

    /// Writes a reply and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the write does not complete in time, or
    /// an I/O error.
    pub async fn write_reply(&mut self, reply: &Reply) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(reply.to_wire().as_bytes());

        let deadline = self.write_timeout;
        let buffer = &self.write_buffer;
        let stream = self.reader.get_mut();
        let write = async move {
            stream.write_all(buffer).await?;
            stream.flush().await
        };
        tokio::time::timeout(deadline, write)
            .await
            .map_err(|_| Error::Timeout)??;

        Ok(())
    }

    async fn read_raw_line(&mut self, max: usize) -> Result<Vec<u8>> {
        tokio::time::timeout(self.read_timeout, self.fill_line(max))
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Reads through the next LF. An overlong line is consumed in full and
    /// then reported, so the next read starts on a line boundary.
    async fn fill_line(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut overflow = false;

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            let (chunk, done) = match buf.iter().position(|&b| b == b'\n') {
                Some(pos) => (&buf[..=pos], true),
                None => (buf, false),
            };
            let len = chunk.len();

            if !overflow {
                line.extend_from_slice(chunk);
                if line.len() > max {
                    overflow = true;
                    line.clear();
                }
            }
            self.reader.consume(len);

            if done {
                break;
            }
        }

        if overflow {
            return Err(Error::LineTooLong);
        }
        Ok(line)
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn stream(mock: tokio_test::io::Mock) -> SmtpStream<tokio_test::io::Mock> {
        SmtpStream::new(mock, TIMEOUT, TIMEOUT)
    }

    #[tokio::test]
    async fn test_read_lines_across_chunks() {
        let mock = Builder::new()
            .read(b"EHLO cli")
            .read(b"ent\r\nNOOP\n")
            .build();
        let mut s = stream(mock);
        assert_eq!(s.read_line().await.unwrap(), "EHLO client");
        assert_eq!(s.read_line().await.unwrap(), "NOOP");
    }

    #[tokio::test]
    async fn test_read_line_eof() {
        let mock = Builder::new().read(b"QUI").build();
        let mut s = stream(mock);
        let err = s.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_overlong_line_is_discarded() {
        let long = vec![b'A'; MAX_COMMAND_LENGTH + 10];
        let mock = Builder::new().read(&long).read(b"\r\nNOOP\r\n").build();
        let mut s = stream(mock);
        assert!(matches!(s.read_line().await, Err(Error::LineTooLong)));
        assert_eq!(s.read_line().await.unwrap(), "NOOP");
    }

    #[tokio::test]
    async fn test_read_data_unstuffs_dots() {
        let mock = Builder::new()
            .read(b"Subject: hi\r\n\r\n..leading dot\r\nbody\r\n.\r\nQUIT\r\n")
            .build();
        let mut s = stream(mock);
        let data = s.read_data(1024).await.unwrap();
        assert_eq!(&data[..], b"Subject: hi\r\n\r\n.leading dot\r\nbody\r\n");
        assert_eq!(s.read_line().await.unwrap(), "QUIT");
    }

    #[tokio::test]
    async fn test_read_data_bare_lf_terminator() {
        let mock = Builder::new().read(b"line\n.\n").build();
        let mut s = stream(mock);
        assert_eq!(&s.read_data(1024).await.unwrap()[..], b"line\n");
    }

    #[tokio::test]
    async fn test_read_data_too_large_stays_in_sync() {
        let mock = Builder::new()
            .read(b"0123456789\r\n0123456789\r\n.\r\nNOOP\r\n")
            .build();
        let mut s = stream(mock);
        assert!(matches!(
            s.read_data(16).await,
            Err(Error::MessageTooLarge(16))
        ));
        assert_eq!(s.read_line().await.unwrap(), "NOOP");
    }

    #[tokio::test]
    async fn test_write_reply() {
        let mock = Builder::new().write(b"250-hello\r\n250 8BITMIME\r\n").build();
        let mut s = stream(mock);
        let reply = Reply::new(ReplyCode::OK, vec!["hello".into(), "8BITMIME".into()]);
        s.write_reply(&reply).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let mock = Builder::new().wait(Duration::from_secs(30)).build();
        let mut s = stream(mock);
        assert!(matches!(s.read_line().await, Err(Error::Timeout)));
    }
}
