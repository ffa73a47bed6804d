//! Outgoing data.

use std::fmt;

use crate::types::Tag;

/// What a [`Transmit`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitKind {
    /// Start of a command, up to its first synchronizing literal.
    Command,
    /// Literal data released by a `+` continuation.
    Literal,
    /// Caller-supplied continuation payload (SASL response, `DONE`).
    Payload,
    /// `*` aborting a continuation exchange.
    Cancel,
}

/// Bytes the I/O layer has to write, in order.
#[derive(Clone, PartialEq, Eq)]
pub struct Transmit {
    /// Command the bytes belong to.
    pub tag: Tag,
    /// What the bytes are.
    pub kind: TransmitKind,
    /// Wire bytes, CRLF included.
    pub data: Vec<u8>,
}

impl Transmit {
    pub(crate) const fn new(tag: Tag, kind: TransmitKind, data: Vec<u8>) -> Self {
        Self { tag, kind, data }
    }

    /// Returns the length of the data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Transmit {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

// Payloads may hold credentials, so only the size is shown.
impl fmt::Debug for Transmit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transmit")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .finish()
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
    use super::*;

    #[test]
    fn debug_hides_data() {
        let t = Transmit::new(
            Tag::new("A0001").unwrap(),
            TransmitKind::Payload,
            b"c2VjcmV0\r\n".to_vec(),
        );
        let shown = format!("{t:?}");
        assert!(!shown.contains("c2VjcmV0"));
        assert!(shown.contains("len: 10"));
        assert_eq!(t.as_ref(), b"c2VjcmV0\r\n");
    }
}
