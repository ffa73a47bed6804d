//! Argument encoding.
//!
//! Strings go out as atoms when they can, quoted when they are short and
//! 7-bit clean, and as literals otherwise. A synchronizing literal ends the
//! current segment: the next segment may only be sent after the server's
//! `+` continuation.

use crate::types::{Flag, LiteralMode};

use super::types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

/// Builds the wire segments of one command.
#[derive(Debug)]
pub struct Encoder {
    mode: LiteralMode,
    threshold: usize,
    segments: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl Encoder {
    /// Creates an encoder. Strings longer than `threshold` become literals.
    #[must_use]
    pub const fn new(mode: LiteralMode, threshold: usize) -> Self {
        Self {
            mode,
            threshold,
            segments: Vec::new(),
            current: Vec::new(),
        }
    }

    /// Appends bytes verbatim.
    pub fn raw(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.current.extend_from_slice(bytes.as_ref());
        self
    }

    /// Appends a single space.
    pub fn sp(&mut self) -> &mut Self {
        self.current.push(b' ');
        self
    }

    /// Appends an astring: atom, quoted string, or literal.
    pub fn astring(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() && s.bytes().all(is_astring_safe) && s.len() <= self.threshold {
            self.raw(s)
        } else {
            self.string(s.as_bytes())
        }
    }

    /// Appends a quoted string or, if it cannot be quoted, a literal.
    pub fn string(&mut self, s: &[u8]) -> &mut Self {
        if s.len() > self.threshold || s.iter().any(|&b| needs_literal(b)) {
            return self.literal(s);
        }
        self.current.push(b'"');
        for &b in s {
            if b == b'"' || b == b'\\' {
                self.current.push(b'\\');
            }
            self.current.push(b);
        }
        self.current.push(b'"');
        self
    }

    /// Appends a literal, non-synchronizing when the server allows it.
    pub fn literal(&mut self, data: &[u8]) -> &mut Self {
        if self.mode.allows_non_sync(data.len()) {
            self.raw(format!("{{{}+}}\r\n", data.len()));
        } else {
            self.raw(format!("{{{}}}\r\n", data.len()));
            self.segments.push(std::mem::take(&mut self.current));
        }
        self.raw(data)
    }

    /// Appends a parenthesized flag list.
    pub fn flag_list(&mut self, flags: &[Flag]) -> &mut Self {
        self.current.push(b'(');
        for (i, flag) in flags.iter().enumerate() {
            if i > 0 {
                self.sp();
            }
            self.raw(flag.as_str());
        }
        self.current.push(b')');
        self
    }

    /// Terminates the command and returns its segments.
    #[must_use]
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.current.extend_from_slice(b"\r\n");
        self.segments.push(self.current);
        self.segments
    }
}

/// Bytes that force a literal: CR, LF, NUL and anything 8-bit.
const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\r' | b'\n' | 0) || b >= 0x80
}

/// Bytes that may appear in an unquoted astring.
const fn is_astring_safe(b: u8) -> bool {
    b > 0x20 && b < 0x7f && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\')
}

pub(super) fn write_fetch_items(enc: &mut Encoder, items: &FetchItems) {
    match items {
        FetchItems::All => {
            enc.raw("ALL");
        }
        FetchItems::Fast => {
            enc.raw("FAST");
        }
        FetchItems::Full => {
            enc.raw("FULL");
        }
        FetchItems::Items(attrs) if attrs.len() == 1 => write_fetch_attribute(enc, &attrs[0]),
        FetchItems::Items(attrs) => {
            enc.raw("(");
            for (i, attr) in attrs.iter().enumerate() {
                if i > 0 {
                    enc.sp();
                }
                write_fetch_attribute(enc, attr);
            }
            enc.raw(")");
        }
    }
}

fn write_fetch_attribute(enc: &mut Encoder, attr: &FetchAttribute) {
    let name = match attr {
        FetchAttribute::Flags => "FLAGS",
        FetchAttribute::InternalDate => "INTERNALDATE",
        FetchAttribute::Rfc822Size => "RFC822.SIZE",
        FetchAttribute::Envelope => "ENVELOPE",
        FetchAttribute::BodyStructure => "BODYSTRUCTURE",
        FetchAttribute::Uid => "UID",
        FetchAttribute::Rfc822Header => "RFC822.HEADER",
        FetchAttribute::ModSeq => "MODSEQ",
        FetchAttribute::Body {
            section,
            peek,
            partial,
        } => {
            enc.raw(if *peek { "BODY.PEEK[" } else { "BODY[" });
            enc.raw(section.as_deref().unwrap_or_default());
            enc.raw("]");
            if let Some((start, len)) = partial {
                enc.raw(format!("<{start}.{len}>"));
            }
            return;
        }
    };
    enc.raw(name);
}

pub(super) fn write_store_action(enc: &mut Encoder, action: &StoreAction, silent: bool) {
    let (prefix, flags) = match action {
        StoreAction::Replace(flags) => ("FLAGS", flags),
        StoreAction::Add(flags) => ("+FLAGS", flags),
        StoreAction::Remove(flags) => ("-FLAGS", flags),
    };
    enc.raw(prefix);
    if silent {
        enc.raw(".SILENT");
    }
    enc.sp().flag_list(flags);
}

pub(super) fn write_search_criteria(enc: &mut Encoder, criteria: &SearchCriteria) {
    let keyword = match criteria {
        SearchCriteria::All => "ALL",
        SearchCriteria::Answered => "ANSWERED",
        SearchCriteria::Deleted => "DELETED",
        SearchCriteria::Draft => "DRAFT",
        SearchCriteria::Flagged => "FLAGGED",
        SearchCriteria::New => "NEW",
        SearchCriteria::Seen => "SEEN",
        SearchCriteria::Undeleted => "UNDELETED",
        SearchCriteria::Unseen => "UNSEEN",
        SearchCriteria::Sequence(set) => {
            enc.raw(set.to_string());
            return;
        }
        SearchCriteria::Uid(set) => {
            enc.raw("UID ").raw(set.to_string());
            return;
        }
        SearchCriteria::Subject(s)
        | SearchCriteria::From(s)
        | SearchCriteria::To(s)
        | SearchCriteria::Body(s)
        | SearchCriteria::Text(s) => {
            let key = match criteria {
                SearchCriteria::Subject(_) => "SUBJECT ",
                SearchCriteria::From(_) => "FROM ",
                SearchCriteria::To(_) => "TO ",
                SearchCriteria::Body(_) => "BODY ",
                _ => "TEXT ",
            };
            enc.raw(key).astring(s);
            return;
        }
        SearchCriteria::Since(date) => {
            enc.raw("SINCE ").raw(date);
            return;
        }
        SearchCriteria::Before(date) => {
            enc.raw("BEFORE ").raw(date);
            return;
        }
        SearchCriteria::Larger(n) => {
            enc.raw(format!("LARGER {n}"));
            return;
        }
        SearchCriteria::Smaller(n) => {
            enc.raw(format!("SMALLER {n}"));
            return;
        }
        SearchCriteria::Header(name, value) => {
            enc.raw("HEADER ").astring(name).sp().astring(value);
            return;
        }
        SearchCriteria::And(all) => {
            enc.raw("(");
            for (i, c) in all.iter().enumerate() {
                if i > 0 {
                    enc.sp();
                }
                write_search_criteria(enc, c);
            }
            enc.raw(")");
            return;
        }
        SearchCriteria::Or(a, b) => {
            enc.raw("OR ");
            write_search_criteria(enc, a);
            enc.sp();
            write_search_criteria(enc, b);
            return;
        }
        SearchCriteria::Not(c) => {
            enc.raw("NOT ");
            write_search_criteria(enc, c);
            return;
        }
    };
    enc.raw(keyword);
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

    fn encode(mode: LiteralMode, f: impl FnOnce(&mut Encoder)) -> Vec<Vec<u8>> {
        let mut enc = Encoder::new(mode, 1024);
        f(&mut enc);
        enc.finish()
    }

    #[test]
    fn atoms_and_quoted() {
        let out = encode(LiteralMode::Synchronizing, |e| {
            e.astring("INBOX").sp().astring("My Folder").sp().astring("").sp().astring("a\"b");
        });
        assert_eq!(out, vec![b"INBOX \"My Folder\" \"\" \"a\\\"b\"\r\n".to_vec()]);
    }

    #[test]
    fn crlf_forces_synchronizing_literal() {
        let out = encode(LiteralMode::Synchronizing, |e| {
            e.raw("A1 LOGIN ").astring("user").sp().astring("pa\r\nss");
        });
        assert_eq!(
            out,
            vec![b"A1 LOGIN user {6}\r\n".to_vec(), b"pa\r\nss\r\n".to_vec()]
        );
    }

    #[test]
    fn literal_plus_stays_in_one_segment() {
        let out = encode(LiteralMode::Plus, |e| {
            e.raw("A1 CREATE ").astring("Entwürfe");
        });
        assert_eq!(out, vec!["A1 CREATE {9+}\r\nEntwürfe\r\n".as_bytes().to_vec()]);
    }

    #[test]
    fn literal_minus_limit() {
        let small = vec![b'x'; 4096];
        let big = vec![b'x'; 4097];
        assert_eq!(encode(LiteralMode::Minus, |e| { e.literal(&small); }).len(), 1);
        assert_eq!(encode(LiteralMode::Minus, |e| { e.literal(&big); }).len(), 2);
    }

    #[test]
    fn threshold_forces_literal() {
        let mut enc = Encoder::new(LiteralMode::Synchronizing, 4);
        enc.astring("short").sp().astring("tiny");
        let out = enc.finish();
        assert_eq!(out[0], b"{5}\r\n".to_vec());
        assert_eq!(out[1], b"short tiny\r\n".to_vec());
    }

    #[test]
    fn search_and_store() {
        let out = encode(LiteralMode::Synchronizing, |e| {
            write_search_criteria(
                e,
                &SearchCriteria::Or(
                    Box::new(SearchCriteria::From("bob".into())),
                    Box::new(SearchCriteria::Not(Box::new(SearchCriteria::Seen))),
                ),
            );
            e.sp();
            write_store_action(e, &StoreAction::Add(vec![Flag::Deleted]), true);
        });
        assert_eq!(out[0], b"OR FROM bob NOT SEEN +FLAGS.SILENT (\\Deleted)\r\n".to_vec());
    }
}
