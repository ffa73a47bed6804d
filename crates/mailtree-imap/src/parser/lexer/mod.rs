//! Tokenizer for server responses.
//!
//! Works over one complete frame: a response line with any literals already
//! spliced in by the decoder. Every error is a protocol error since the input
//! always comes from the server.

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Lexer over a single response frame.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer for the given frame.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// Returns true if all input was consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Peeks `offset` bytes ahead.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips up to `n` bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Reads the next token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on bytes that cannot start a token, a
    /// broken quoted string, or a malformed literal.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b' ' => Some(Token::Space),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.skip(2);
                Ok(Token::Crlf)
            }
            b'"' => self.read_quoted(),
            b'{' => self.read_literal(),
            _ if is_atom_char(byte) => {
                let atom = self.take_while(is_atom_char)?;
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(Token::Nil)
                } else if atom.bytes().all(|b| b.is_ascii_digit()) {
                    // Digit runs too long for u64 stay atoms.
                    Ok(atom.parse().map_or(Token::Atom(atom), Token::Number))
                } else {
                    Ok(Token::Atom(atom))
                }
            }
            _ => Err(self.error(format!("unexpected byte {byte:#04x}"))),
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> Result<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("invalid UTF-8 in atom"))
    }

    fn read_quoted(&mut self) -> Result<Token<'a>> {
        self.advance();
        let mut out = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.error(format!("invalid escape \\{}", c as char))),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("unterminated quoted string"));
                }
                Some(c) => out.push(c),
            }
        }

        Ok(Token::QuotedString(String::from_utf8_lossy(&out).into_owned()))
    }

    fn read_literal(&mut self) -> Result<Token<'a>> {
        let (len, consumed) = literal_prefix(self.remaining())
            .ok_or_else(|| self.error("malformed literal prefix"))?;
        self.skip(consumed);

        if self.peek() != Some(b'\r') || self.peek_at(1) != Some(b'\n') {
            return Err(self.error("expected CRLF after literal prefix"));
        }
        self.skip(2);

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("literal longer than frame"))?;
        let data = &self.input[self.pos..end];
        self.pos = end;
        Ok(Token::Literal(data))
    }

    /// Consumes a token and checks its kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a different token is found.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes a single space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the next byte is not a space.
    pub fn expect_space(&mut self) -> Result<()> {
        if self.advance() == Some(b' ') {
            Ok(())
        } else {
            Err(self.error("expected space"))
        }
    }

    /// Reads an astring: atom characters (including `]`), quoted, or literal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if no string is present.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'"' | b'{') => self.read_string(),
            Some(b) if is_astring_char(b) => Ok(self.take_while(is_astring_char)?.to_string()),
            _ => Err(self.error("expected astring")),
        }
    }

    /// Reads a quoted string or literal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on any other token.
    pub fn read_string(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(data).into_owned()),
            token => Err(self.error(format!("expected string, got {token:?}"))),
        }
    }

    /// Reads `NIL` or a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on any other token.
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        if self.peek().is_some_and(|b| b == b'N' || b == b'n') {
            self.expect(Token::Nil)?;
            return Ok(None);
        }
        self.read_string().map(Some)
    }

    /// Reads a 32-bit number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the token is not a number or overflows.
    pub fn read_number(&mut self) -> Result<u32> {
        let n = self.read_number64()?;
        u32::try_from(n).map_err(|_| self.error(format!("number {n} out of range")))
    }

    /// Reads a 64-bit number (mod-sequences).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the token is not a number.
    pub fn read_number64(&mut self) -> Result<u64> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(format!("expected number, got {token:?}"))),
        }
    }

    /// Reads a non-zero 32-bit number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for zero or a non-number.
    pub fn read_nz_number(&mut self) -> Result<u32> {
        match self.read_number()? {
            0 => Err(self.error("zero where a non-zero number is required")),
            n => Ok(n),
        }
    }

    /// Reads an atom.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on any other token.
    pub fn read_atom(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(format!("expected atom, got {token:?}"))),
        }
    }

    /// Reads the rest of the line as text and consumes the CRLF.
    pub fn read_text(&mut self) -> String {
        let remaining = self.remaining();
        let end = remaining
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(remaining.len());
        self.skip(end + 2);
        String::from_utf8_lossy(&remaining[..end]).into_owned()
    }

    /// Builds a protocol error at the current position.
    pub(crate) fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::Protocol(format!("{message} at byte {}", self.pos))
    }
}

/// Parses `{n}` or `{n+}` at the start of `input`.
///
/// Returns the length and the number of bytes of the prefix.
#[must_use]
pub fn literal_prefix(input: &[u8]) -> Option<(usize, usize)> {
    let rest = input.strip_prefix(b"{")?;
    let close = rest.iter().position(|&b| b == b'}')?;
    let digits = rest[..close].strip_suffix(b"+").unwrap_or(&rest[..close]);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let len = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some((len, close + 2))
}

/// Returns true if the byte may appear in an atom.
///
/// `\` is accepted so that flags like `\Seen` lex as one atom.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b > 0x20
        && b < 0x7f
        && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b']' | b'[')
}

/// Atom characters plus `]`, as allowed in an astring.
#[must_use]
pub const fn is_astring_char(b: u8) -> bool {
    is_atom_char(b) || b == b']' || b == b'[' || b == b'%' || b == b'*'
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

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn tagged_line() {
        assert_eq!(
            tokens(b"A001 OK done\r\n"),
            vec![
                Token::Atom("A001"),
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::Atom("done"),
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn numbers_and_nil() {
        assert_eq!(
            tokens(b"12 nil 18446744073709551616"),
            vec![
                Token::Number(12),
                Token::Space,
                Token::Nil,
                Token::Space,
                Token::Atom("18446744073709551616"),
            ]
        );
    }

    #[test]
    fn flags_and_brackets() {
        assert_eq!(
            tokens(b"[PERMANENTFLAGS (\\Seen \\*)]"),
            vec![
                Token::LBracket,
                Token::Atom("PERMANENTFLAGS"),
                Token::Space,
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("\\"),
                Token::Asterisk,
                Token::RParen,
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn quoted_with_escapes() {
        assert_eq!(
            tokens(b"\"a \\\"b\\\" \\\\c\""),
            vec![Token::QuotedString("a \"b\" \\c".to_string())]
        );
        assert!(Lexer::new(b"\"open").next_token().is_err());
        assert!(Lexer::new(b"\"bad \\n\"").next_token().is_err());
    }

    #[test]
    fn literal_keeps_embedded_crlf() {
        let mut lexer = Lexer::new(b"{7}\r\nab\r\ncd)");
        assert_eq!(lexer.next_token().unwrap(), Token::Literal(b"ab\r\ncd)"));
        assert!(lexer.is_eof());
    }

    #[test]
    fn non_sync_literal_prefix() {
        assert_eq!(literal_prefix(b"{12+}\r\n"), Some((12, 5)));
        assert_eq!(literal_prefix(b"{0}"), Some((0, 3)));
        assert_eq!(literal_prefix(b"{}"), None);
        assert_eq!(literal_prefix(b"{1a}"), None);
    }

    #[test]
    fn short_literal_is_error() {
        let err = Lexer::new(b"{10}\r\nabc").next_token().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn astring_variants() {
        assert_eq!(Lexer::new(b"2024").read_astring().unwrap(), "2024");
        assert_eq!(Lexer::new(b"a]b c").read_astring().unwrap(), "a]b");
        assert_eq!(Lexer::new(b"\"with space\"").read_astring().unwrap(), "with space");
        assert_eq!(Lexer::new(b"{3}\r\nabc").read_astring().unwrap(), "abc");
        assert!(Lexer::new(b"(x)").read_astring().is_err());
    }

    #[test]
    fn rest_of_line() {
        let mut lexer = Lexer::new(b"hello world\r\n");
        assert_eq!(lexer.read_text(), "hello world");
        assert!(lexer.is_eof());
    }
}
