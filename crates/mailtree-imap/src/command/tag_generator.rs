//! Command tags.

use crate::types::Tag;
use crate::{Error, Result};

/// Sequential tag source: `A0001`, `A0002`, ...
///
/// Tags are never reused. Once the counter is spent, [`TagGenerator::next`]
/// fails and the connection has to be replaced.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    next: u32,
}

impl TagGenerator {
    /// Creates a generator with the given prefix.
    ///
    /// Returns `None` if `prefix` cannot start a tag.
    #[must_use]
    pub fn new(prefix: char) -> Option<Self> {
        Tag::new(prefix.to_string())?;
        Some(Self { prefix, next: 1 })
    }

    /// Issues the next tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] once `u32::MAX` tags were issued.
    pub fn next(&mut self) -> Result<Tag> {
        let n = self.next;
        self.next = n
            .checked_add(1)
            .ok_or_else(|| Error::InvalidState("tag counter exhausted".into()))?;
        Tag::new(format!("{}{n:04}", self.prefix))
            .ok_or_else(|| Error::InvalidState("invalid tag prefix".into()))
    }

    /// Number of tags issued so far.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.next - 1
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self {
            prefix: 'A',
            next: 1,
        }
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
    fn sequential() {
        let mut tags = TagGenerator::default();
        assert_eq!(tags.next().unwrap().as_str(), "A0001");
        assert_eq!(tags.next().unwrap().as_str(), "A0002");
        assert_eq!(tags.issued(), 2);
    }

    #[test]
    fn custom_prefix() {
        let mut tags = TagGenerator::new('T').unwrap();
        assert_eq!(tags.next().unwrap().as_str(), "T0001");
        assert!(TagGenerator::new('*').is_none());
        assert!(TagGenerator::new('+').is_none());
    }

    #[test]
    fn padding_grows() {
        let mut tags = TagGenerator::new('X').unwrap();
        tags.next = 12345;
        assert_eq!(tags.next().unwrap().as_str(), "X12345");
    }

    #[test]
    fn unique() {
        let mut tags = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10000 {
            assert!(seen.insert(tags.next().unwrap()));
        }
    }

    #[test]
    fn overflow_is_an_error() {
        let mut tags = TagGenerator::default();
        tags.next = u32::MAX;
        assert!(matches!(tags.next(), Err(Error::InvalidState(_))));
        assert!(tags.next().is_err());
    }
}
