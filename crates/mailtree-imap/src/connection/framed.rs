//! Framed I/O for IMAP protocol.
//!
//! Reads go through a [`ResponseDecoder`], so a response is returned only
//! once it is complete, literals included. Writes are flushed immediately.

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::parser::{Response, ResponseDecoder};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Framed connection for IMAP protocol.
#[derive(Debug)]
pub struct FramedStream<S> {
    stream: S,
    decoder: ResponseDecoder,
    read_buf: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self::with_decoder(stream, ResponseDecoder::new())
    }

    /// Creates a framed stream with a preconfigured decoder.
    pub fn with_decoder(stream: S, decoder: ResponseDecoder) -> Self {
        Self {
            stream,
            decoder,
            read_buf: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads the next complete response.
    ///
    /// End of stream is [`Error::ConnectionLost`], or [`Error::Protocol`] if
    /// it cut a response short.
    pub async fn read_response(&mut self) -> Result<Response> {
        loop {
            if let Some(response) = self.decoder.next_response()? {
                return Ok(response);
            }

            self.read_buf.clear();
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                self.decoder.finish()?;
                return Err(Error::ConnectionLost("connection closed by server".into()));
            }
            self.decoder.feed(&self.read_buf[..n]);
        }
    }

    /// Writes bytes and flushes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub const fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Bytes received but not yet decoded are discarded.
    pub fn into_inner(self) -> S {
        self.stream
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
    use tokio_test::io::Builder;

    use super::*;
    use crate::parser::{FetchItem, UntaggedResponse};
    use crate::types::Status;

    #[tokio::test]
    async fn test_framed_read_simple_line() {
        let mock = Builder::new().read(b"* OK IMAP4rev1 ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert!(matches!(
            response,
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::Ok,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_framed_read_split_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {11}\r\n")
            .read(b"Hello")
            .read(b" World)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        let Response::Untagged(UntaggedResponse::Fetch { items, .. }) = response else {
            panic!("expected FETCH");
        };
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: String::new(),
                origin: None,
                data: Some(b"Hello World".to_vec())
            }
        );
    }

    #[tokio::test]
    async fn test_framed_two_responses_one_read() {
        let mock = Builder::new().read(b"* 3 EXISTS\r\nA0001 OK done\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(
            framed.read_response().await.unwrap(),
            Response::Untagged(UntaggedResponse::Exists(3))
        );
        assert!(matches!(framed.read_response().await.unwrap(), Response::Tagged { .. }));
    }

    #[tokio::test]
    async fn test_framed_write() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.write_all(b"A0001 NOOP\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_is_connection_lost() {
        let mock = Builder::new().build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(
            framed.read_response().await,
            Err(Error::ConnectionLost(_))
        ));
    }

    #[tokio::test]
    async fn test_eof_mid_literal_is_protocol_error() {
        let mock = Builder::new().read(b"* 1 FETCH (BODY[] {100}\r\nshort").build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(framed.read_response().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {200}\r\n")
            .build();
        let mut framed = FramedStream::with_decoder(mock, ResponseDecoder::with_limits(1024, 100));
        assert!(matches!(framed.read_response().await, Err(Error::Protocol(_))));
    }
}
