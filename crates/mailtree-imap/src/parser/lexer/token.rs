//! Lexer tokens.

/// Token produced by the lexer. Atoms and literals borrow from the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted string without special characters).
    Atom(&'a str),
    /// Quoted string, unescaped.
    QuotedString(String),
    /// Literal payload from `{n}` or `{n+}`.
    Literal(&'a [u8]),
    /// Number.
    Number(u64),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `NIL`, any case.
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}
