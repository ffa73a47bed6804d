//! Tags and message identifiers.

use std::fmt;
use std::num::NonZeroU32;

/// Command tag.
///
/// Tags correlate a command with its tagged completion. They are made of
/// ASTRING characters excluding `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// Creates a tag, or `None` if `tag` contains characters a tag may not.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Option<Self> {
        let tag = tag.into();
        Self::is_valid(&tag).then_some(Self(tag))
    }

    /// Returns true if `s` is a well-formed tag.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty()
            && s.bytes().all(|b| {
                b.is_ascii_graphic() && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\' | b'+')
            })
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wraps a raw value, `None` for zero.
            #[must_use]
            pub const fn new(n: u32) -> Option<Self> {
                match NonZeroU32::new(n) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            /// Returns the underlying value.
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<NonZeroU32> for $name {
            fn from(n: NonZeroU32) -> Self {
                Self(n)
            }
        }
    };
}

nonzero_id! {
    /// Message sequence number.
    ///
    /// Positions start at 1 and shift down when earlier messages are
    /// expunged.
    SeqNum
}

nonzero_id! {
    /// Message UID. Stable for as long as the mailbox UIDVALIDITY is.
    Uid
}

nonzero_id! {
    /// UIDVALIDITY of a mailbox. A change invalidates every cached UID.
    UidValidity
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
    fn tag_validation() {
        assert_eq!(Tag::new("A0001").unwrap().as_str(), "A0001");
        assert!(Tag::new("").is_none());
        assert!(Tag::new("A 1").is_none());
        assert!(Tag::new("A+1").is_none());
        assert!(Tag::new("*").is_none());
        assert_eq!(format!("{}", Tag::new("x.1").unwrap()), "x.1");
    }

    #[test]
    fn ids_reject_zero() {
        assert!(SeqNum::new(0).is_none());
        assert!(Uid::new(0).is_none());
        assert!(UidValidity::new(0).is_none());
        assert_eq!(Uid::new(u32::MAX).unwrap().get(), u32::MAX);
    }

    #[test]
    fn ordering_and_display() {
        assert!(SeqNum::new(1).unwrap() < SeqNum::new(2).unwrap());
        assert_eq!(Uid::new(12345).unwrap().to_string(), "12345");
        assert_eq!(UidValidity::new(987654321).unwrap().get(), 987654321);
    }
}
