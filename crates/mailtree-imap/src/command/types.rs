//! Command argument types.

use crate::types::{Flag, SequenceSet, UidSet};

/// Messages addressed by a command.
///
/// The variant decides whether the command goes out with the `UID` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSet {
    /// Message sequence numbers.
    Seq(SequenceSet),
    /// UIDs.
    Uid(UidSet),
}

impl MessageSet {
    /// Returns true for a UID set.
    #[must_use]
    pub const fn is_uid(&self) -> bool {
        matches!(self, Self::Uid(_))
    }

    /// Returns true if the set addresses no message at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Seq(set) => set.is_empty(),
            Self::Uid(set) => set.is_empty(),
        }
    }

    pub(crate) fn serialize(&self) -> String {
        match self {
            Self::Seq(set) => set.serialize(),
            Self::Uid(set) => set.serialize(),
        }
    }
}

impl From<SequenceSet> for MessageSet {
    fn from(set: SequenceSet) -> Self {
        Self::Seq(set)
    }
}

impl From<UidSet> for MessageSet {
    fn from(set: UidSet) -> Self {
        Self::Uid(set)
    }
}

/// STATUS attributes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
}

impl StatusAttribute {
    /// Every attribute RFC 3501 defines.
    pub const ALL: [Self; 5] = [
        Self::Messages,
        Self::Recent,
        Self::UidNext,
        Self::UidValidity,
        Self::Unseen,
    ];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// FETCH items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// FLAGS INTERNALDATE RFC822.SIZE ENVELOPE.
    All,
    /// FLAGS INTERNALDATE RFC822.SIZE ENVELOPE BODY.
    Full,
    /// FLAGS INTERNALDATE RFC822.SIZE.
    Fast,
    /// Custom list of items.
    Items(Vec<FetchAttribute>),
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `ENVELOPE`
    Envelope,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `UID`
    Uid,
    /// `RFC822.HEADER`
    Rfc822Header,
    /// `MODSEQ` (CONDSTORE).
    ModSeq,
    /// `BODY[section]<start.len>`, optionally `.PEEK`.
    Body {
        /// Section specifier; `None` for the whole message.
        section: Option<String>,
        /// Leave `\Seen` untouched.
        peek: bool,
        /// Partial fetch range.
        partial: Option<(u32, u32)>,
    },
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `FLAGS`
    Replace(Vec<Flag>),
    /// `+FLAGS`
    Add(Vec<Flag>),
    /// `-FLAGS`
    Remove(Vec<Flag>),
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// Every message.
    All,
    /// `\Answered` set.
    Answered,
    /// `\Deleted` set.
    Deleted,
    /// `\Draft` set.
    Draft,
    /// `\Flagged` set.
    Flagged,
    /// Recent and not yet seen.
    New,
    /// `\Seen` set.
    Seen,
    /// `\Deleted` not set.
    Undeleted,
    /// `\Seen` not set.
    Unseen,
    /// Messages in a sequence set.
    Sequence(SequenceSet),
    /// `UID` key.
    Uid(UidSet),
    /// `SUBJECT` contains the string.
    Subject(String),
    /// `FROM` contains the string.
    From(String),
    /// `TO` contains the string.
    To(String),
    /// Body contains the string.
    Body(String),
    /// Header or body contains the string.
    Text(String),
    /// `SINCE` with an IMAP date such as `1-Feb-1994`.
    Since(String),
    /// `BEFORE` with an IMAP date.
    Before(String),
    /// Larger than this many bytes.
    Larger(u32),
    /// Smaller than this many bytes.
    Smaller(u32),
    /// Header field name and the string its value contains.
    Header(String, String),
    /// All of these, as a parenthesized group.
    And(Vec<Self>),
    /// Either one.
    Or(Box<Self>, Box<Self>),
    /// Negation.
    Not(Box<Self>),
}

impl SearchCriteria {
    /// Returns true if any text key holds non-ASCII characters, which
    /// requires `CHARSET UTF-8`.
    #[must_use]
    pub fn needs_utf8(&self) -> bool {
        match self {
            Self::Subject(s) | Self::From(s) | Self::To(s) | Self::Body(s) | Self::Text(s) => {
                !s.is_ascii()
            }
            Self::Header(name, value) => !name.is_ascii() || !value.is_ascii(),
            Self::And(all) => all.iter().any(Self::needs_utf8),
            Self::Or(a, b) => a.needs_utf8() || b.needs_utf8(),
            Self::Not(c) => c.needs_utf8(),
            _ => false,
        }
    }

    /// Returns true if a message-set key, or a group, is empty anywhere in
    /// the criteria.
    #[must_use]
    pub fn has_empty_key(&self) -> bool {
        match self {
            Self::Sequence(set) => set.is_empty(),
            Self::Uid(set) => set.is_empty(),
            Self::And(all) => all.is_empty() || all.iter().any(Self::has_empty_key),
            Self::Or(a, b) => a.has_empty_key() || b.has_empty_key(),
            Self::Not(c) => c.has_empty_key(),
            _ => false,
        }
    }
}
