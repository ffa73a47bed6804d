//! Streaming response framing.
//!
//! The decoder accepts bytes as they arrive and hands out one [`Response`] at
//! a time. A line ending in `{n}` or `{n+}` switches it to reading exactly `n`
//! literal bytes, embedded CRLFs included, after which line mode resumes for
//! the rest of the same response. Status lines (`OK`, `NO`, `BAD`, `BYE`,
//! `PREAUTH`) and continuation requests carry free text and never announce a
//! literal, whatever they end with.
//!
//! The first error is final. The decoder enters [`DecoderState::Done`] and
//! every later call fails; a new stream needs a new decoder.

use bytes::{Buf, BytesMut};

use super::lexer::literal_prefix;
use super::response::{Response, ResponseParser};
use crate::{Error, Result};

/// Longest line accepted outside literals.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted.
pub const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Largest complete response accepted, all lines and literals together.
pub const MAX_RESPONSE_SIZE: usize = 128 * 1024 * 1024;

/// Framing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for a CRLF-terminated line.
    AwaitingLine,
    /// Inside a literal with this many bytes left.
    ReadingLiteral(usize),
    /// Failed or finished. Nothing more will be decoded.
    Done,
}

/// Incremental decoder for one server stream.
#[derive(Debug)]
pub struct ResponseDecoder {
    buf: BytesMut,
    frame: BytesMut,
    state: DecoderState,
    max_line: usize,
    max_literal: usize,
    max_response: usize,
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDecoder {
    /// Creates a decoder with the default size limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(MAX_LINE_LENGTH, MAX_LITERAL_SIZE)
    }

    /// Creates a decoder with custom size limits.
    #[must_use]
    pub fn with_limits(max_line: usize, max_literal: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8192),
            frame: BytesMut::new(),
            state: DecoderState::AwaitingLine,
            max_line,
            max_literal,
            max_response: MAX_RESPONSE_SIZE,
        }
    }

    /// Sets the limit for one complete response.
    #[must_use]
    pub const fn max_response(mut self, limit: usize) -> Self {
        self.max_response = limit;
        self
    }

    /// Current framing state.
    #[must_use]
    pub const fn state(&self) -> DecoderState {
        self.state
    }

    /// Returns true if a response is partially buffered.
    #[must_use]
    pub fn is_mid_response(&self) -> bool {
        !self.frame.is_empty() || !self.buf.is_empty()
    }

    /// Appends received bytes.
    pub fn feed(&mut self, data: &[u8]) {
        if self.state != DecoderState::Done {
            self.buf.extend_from_slice(data);
        }
    }

    /// Returns the next complete response, or `None` if more input is needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for an over-long line, an over-size
    /// literal, a grammar violation, or any call after an earlier error.
    pub fn next_response(&mut self) -> Result<Option<Response>> {
        loop {
            match self.state {
                DecoderState::Done => {
                    return Err(Error::Protocol("decoder stopped after an earlier error".into()));
                }
                DecoderState::ReadingLiteral(remaining) => {
                    if self.buf.is_empty() {
                        return Ok(None);
                    }
                    let take = remaining.min(self.buf.len());
                    self.frame.extend_from_slice(&self.buf[..take]);
                    self.buf.advance(take);
                    self.state = match remaining - take {
                        0 => DecoderState::AwaitingLine,
                        left => DecoderState::ReadingLiteral(left),
                    };
                }
                DecoderState::AwaitingLine => {
                    let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") else {
                        if self.buf.len() > self.max_line {
                            return self.fail("line exceeds maximum length");
                        }
                        return Ok(None);
                    };
                    if pos > self.max_line {
                        return self.fail("line exceeds maximum length");
                    }

                    let line = self.buf.split_to(pos + 2);
                    let announced = if self.frame.is_empty() && is_status_line(&line) {
                        None
                    } else {
                        trailing_literal(&line)
                    };
                    let size = self.frame.len() + line.len() + announced.unwrap_or(0);
                    if size > self.max_response {
                        return self.fail(&format!("response of {size} bytes exceeds limit"));
                    }
                    if let Some(len) = announced {
                        if len > self.max_literal {
                            return self.fail(&format!("literal of {len} bytes exceeds limit"));
                        }
                        self.frame.extend_from_slice(&line);
                        if len > 0 {
                            self.state = DecoderState::ReadingLiteral(len);
                        }
                        continue;
                    }

                    self.frame.extend_from_slice(&line);
                    let frame = self.frame.split();
                    tracing::trace!(frame = %String::from_utf8_lossy(&frame).trim_end(), "received");

                    return match ResponseParser::parse(&frame) {
                        Ok(response) => Ok(Some(response)),
                        Err(err) => {
                            self.state = DecoderState::Done;
                            Err(err)
                        }
                    };
                }
            }
        }
    }

    /// Signals end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the stream closed mid-line or
    /// mid-literal.
    pub fn finish(&mut self) -> Result<()> {
        let state = self.state;
        let partial = self.is_mid_response();
        self.state = DecoderState::Done;
        match state {
            DecoderState::ReadingLiteral(left) => Err(Error::Protocol(format!(
                "stream closed with {left} literal bytes outstanding"
            ))),
            DecoderState::AwaitingLine if partial => {
                Err(Error::Protocol("stream closed mid-line".into()))
            }
            _ => Ok(()),
        }
    }

    fn fail<T>(&mut self, message: &str) -> Result<T> {
        self.state = DecoderState::Done;
        self.buf.clear();
        self.frame.clear();
        Err(Error::Protocol(message.to_string()))
    }
}

/// Returns true for a tagged or untagged status line and for a continuation
/// request.
fn is_status_line(line: &[u8]) -> bool {
    if line.starts_with(b"+") {
        return true;
    }
    let mut words = line.split(|&b| b == b' ');
    let (Some(_tag), Some(word)) = (words.next(), words.next()) else {
        return false;
    };
    let word = word.strip_suffix(b"\r\n").unwrap_or(word);
    [&b"OK"[..], b"NO", b"BAD", b"BYE", b"PREAUTH"]
        .iter()
        .any(|status| word.eq_ignore_ascii_case(status))
}

/// Length of the literal announced at the end of `line`, if any.
fn trailing_literal(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?;
    if body.last() != Some(&b'}') {
        return None;
    }
    let open = body.iter().rposition(|&b| b == b'{')?;
    let (len, consumed) = literal_prefix(&body[open..])?;
    (open + consumed == body.len()).then_some(len)
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
    use crate::parser::{FetchItem, UntaggedResponse};

    fn body_of(response: &Response) -> Vec<u8> {
        let Response::Untagged(UntaggedResponse::Fetch { items, .. }) = response else {
            panic!("expected FETCH, got {response:?}");
        };
        items
            .iter()
            .find_map(|item| match item {
                FetchItem::Body { data: Some(d), .. } => Some(d.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn single_lines() {
        let mut decoder = ResponseDecoder::new();
        decoder.feed(b"* OK ready\r\nA1 OK done\r\n");
        assert!(matches!(decoder.next_response().unwrap(), Some(Response::Untagged(_))));
        assert!(matches!(decoder.next_response().unwrap(), Some(Response::Tagged { .. })));
        assert!(decoder.next_response().unwrap().is_none());
        assert_eq!(decoder.state(), DecoderState::AwaitingLine);
    }

    #[test]
    fn literal_with_embedded_crlf() {
        let mut decoder = ResponseDecoder::new();
        decoder.feed(b"* 1 FETCH (BODY[] {12}\r\nab\r\n\r\ncd\r\nef UID 9)\r\n");
        let response = decoder.next_response().unwrap().unwrap();
        assert_eq!(body_of(&response), b"ab\r\n\r\ncd\r\nef");
    }

    #[test]
    fn byte_at_a_time() {
        let input = b"* 3 FETCH (BODY[TEXT] {5}\r\n1\r\n23 FLAGS (\\Seen))\r\nA7 OK FETCH done\r\n";
        let mut decoder = ResponseDecoder::new();
        let mut responses = Vec::new();
        for byte in input {
            decoder.feed(std::slice::from_ref(byte));
            while let Some(r) = decoder.next_response().unwrap() {
                responses.push(r);
            }
        }
        assert_eq!(responses.len(), 2);
        assert_eq!(body_of(&responses[0]), b"1\r\n23");
    }

    #[test]
    fn reports_literal_state() {
        let mut decoder = ResponseDecoder::new();
        decoder.feed(b"* 1 FETCH (RFC822 {10}\r\nabc");
        assert!(decoder.next_response().unwrap().is_none());
        assert_eq!(decoder.state(), DecoderState::ReadingLiteral(7));
    }

    #[test]
    fn close_mid_literal_is_protocol_error() {
        let mut decoder = ResponseDecoder::new();
        decoder.feed(b"* 1 FETCH (RFC822 {10}\r\nabc");
        decoder.next_response().unwrap();
        assert!(matches!(decoder.finish(), Err(Error::Protocol(_))));
        assert_eq!(decoder.state(), DecoderState::Done);
    }

    #[test]
    fn close_mid_line_is_protocol_error() {
        let mut decoder = ResponseDecoder::new();
        decoder.feed(b"* OK par");
        assert!(decoder.next_response().unwrap().is_none());
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn clean_close_is_fine() {
        let mut decoder = ResponseDecoder::new();
        decoder.feed(b"* BYE\r\n");
        decoder.next_response().unwrap();
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn stays_done_after_error() {
        let mut decoder = ResponseDecoder::new();
        decoder.feed(b"%%% nonsense\r\n* OK fine\r\n");
        assert!(matches!(decoder.next_response(), Err(Error::Protocol(_))));
        assert!(matches!(decoder.next_response(), Err(Error::Protocol(_))));
        decoder.feed(b"* OK more\r\n");
        assert!(decoder.next_response().is_err());
    }

    #[test]
    fn limits() {
        let mut decoder = ResponseDecoder::with_limits(16, 8);
        decoder.feed(b"* OK this line is far too long");
        assert!(decoder.next_response().is_err());

        let mut decoder = ResponseDecoder::with_limits(1024, 8);
        decoder.feed(b"* 1 FETCH (RFC822 {9}\r\n");
        assert!(decoder.next_response().is_err());
    }

    #[test]
    fn status_text_is_not_a_literal() {
        let mut decoder = ResponseDecoder::new();
        decoder.feed(b"* OK [ALERT] quota at {90}\r\nA3 NO over {5}\r\n+ send {7}\r\n");
        let Some(Response::Untagged(UntaggedResponse::Condition { text, .. })) =
            decoder.next_response().unwrap()
        else {
            panic!("expected status line");
        };
        assert_eq!(text, "quota at {90}");
        assert!(matches!(decoder.next_response().unwrap(), Some(Response::Tagged { .. })));
        assert!(matches!(
            decoder.next_response().unwrap(),
            Some(Response::Continuation { .. })
        ));
        assert_eq!(decoder.state(), DecoderState::AwaitingLine);
    }

    #[test]
    fn response_size_is_capped_across_literals() {
        let mut decoder = ResponseDecoder::with_limits(1024, 64).max_response(100);
        decoder.feed(b"* 1 FETCH (BODY[] {40}\r\n");
        decoder.feed(&[b'x'; 40]);
        decoder.feed(b" BODY[TEXT] {40}\r\n");
        decoder.feed(&[b'y'; 40]);
        decoder.feed(b")\r\n");
        assert!(matches!(decoder.next_response(), Err(Error::Protocol(_))));
        assert_eq!(decoder.state(), DecoderState::Done);

        let mut decoder = ResponseDecoder::with_limits(1024, 64).max_response(100);
        decoder.feed(b"* 1 FETCH (BODY[] {40}\r\n");
        decoder.feed(&[b'x'; 40]);
        decoder.feed(b")\r\n");
        assert_eq!(body_of(&decoder.next_response().unwrap().unwrap()).len(), 40);
    }

    #[test]
    fn status_line_detection() {
        assert!(is_status_line(b"* OK hi {5}\r\n"));
        assert!(is_status_line(b"a1 bad nope\r\n"));
        assert!(is_status_line(b"* BYE\r\n"));
        assert!(is_status_line(b"+ {5}\r\n"));
        assert!(!is_status_line(b"* 1 FETCH (RFC822 {10}\r\n"));
        assert!(!is_status_line(b"* LIST () \"/\" {4}\r\n"));
    }

    #[test]
    fn trailing_literal_detection() {
        assert_eq!(trailing_literal(b"* 1 FETCH (RFC822 {10}\r\n"), Some(10));
        assert_eq!(trailing_literal(b"A1 LOGIN {3+}\r\n"), Some(3));
        assert_eq!(trailing_literal(b"* OK {not}\r\n"), None);
        assert_eq!(trailing_literal(b"* OK done\r\n"), None);
    }
}
