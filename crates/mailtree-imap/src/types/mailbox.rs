//! Mailbox names, LIST data and SELECT state.

use std::fmt;

use super::{Flags, SeqNum, Uid, UidValidity};

/// Mailbox name.
///
/// `INBOX` is case-insensitive on the wire; any spelling of it is stored as
/// `INBOX`. Other names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mailbox(String);

impl Mailbox {
    /// Creates a mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("INBOX") {
            Self::inbox()
        } else {
            Self(name)
        }
    }

    /// The INBOX mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns true if this is INBOX.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0 == "INBOX"
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Mailbox {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Mailbox {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// State of the open mailbox, built from the SELECT/EXAMINE responses and
/// kept current by unsolicited updates.
#[derive(Debug, Clone, Default)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// First unseen message.
    pub unseen: Option<SeqNum>,
    /// Next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<UidValidity>,
    /// Flags defined for this mailbox.
    pub flags: Flags,
    /// Flags that can be stored permanently.
    pub permanent_flags: Flags,
    /// Whether the mailbox was opened read-only.
    pub read_only: bool,
}

/// One LIST or LSUB entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// Returns true if the attribute is present.
    #[must_use]
    pub fn has(&self, attr: &MailboxAttribute) -> bool {
        self.attributes.contains(attr)
    }

    /// Returns true if the entry cannot be selected.
    #[must_use]
    pub fn is_noselect(&self) -> bool {
        self.has(&MailboxAttribute::NoSelect) || self.has(&MailboxAttribute::NonExistent)
    }

    /// Returns the SPECIAL-USE attribute, if any.
    #[must_use]
    pub fn special_use(&self) -> Option<&MailboxAttribute> {
        self.attributes.iter().find(|a| a.is_special_use())
    }
}

/// Mailbox attributes from LIST and LSUB responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\NoInferiors`
    NoInferiors,
    /// `\NonExistent`
    NonExistent,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\HasChildren`
    HasChildren,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// `\Subscribed`
    Subscribed,
    /// `\Remote`
    Remote,
    /// `\All`
    All,
    /// `\Archive`
    Archive,
    /// `\Drafts`
    Drafts,
    /// `\Flagged`
    Flagged,
    /// `\Junk`, also sent as `\Spam` by some servers.
    Junk,
    /// `\Sent`
    Sent,
    /// `\Trash`
    Trash,
    /// Unknown attribute, verbatim.
    Unknown(String),
}

impl MailboxAttribute {
    /// Parses an attribute. Matching is case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\SUBSCRIBED" => Self::Subscribed,
            "\\REMOTE" => Self::Remote,
            "\\ALL" => Self::All,
            "\\ARCHIVE" => Self::Archive,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Returns true for RFC 6154 special-use attributes.
    #[must_use]
    pub const fn is_special_use(&self) -> bool {
        matches!(
            self,
            Self::All | Self::Archive | Self::Drafts | Self::Flagged | Self::Junk | Self::Sent | Self::Trash
        )
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

    mod mailbox_tests {
        use super::*;

        #[test]
        fn inbox_normalized() {
            assert_eq!(Mailbox::new("inbox"), Mailbox::inbox());
            assert!(Mailbox::new("InBoX").is_inbox());
            assert_eq!(Mailbox::new("inbox").as_str(), "INBOX");
        }

        #[test]
        fn other_names_verbatim() {
            let mb = Mailbox::new("INBOX/sub");
            assert_eq!(mb.as_str(), "INBOX/sub");
            assert!(!mb.is_inbox());
            assert_ne!(Mailbox::new("sent"), Mailbox::new("Sent"));
        }
    }

    mod attribute_tests {
        use super::*;

        #[test]
        fn parse_known() {
            assert_eq!(MailboxAttribute::parse("\\Noselect"), MailboxAttribute::NoSelect);
            assert_eq!(MailboxAttribute::parse("\\NOINFERIORS"), MailboxAttribute::NoInferiors);
            assert_eq!(MailboxAttribute::parse("\\Spam"), MailboxAttribute::Junk);
            assert_eq!(MailboxAttribute::parse("\\Subscribed"), MailboxAttribute::Subscribed);
        }

        #[test]
        fn parse_unknown() {
            assert_eq!(
                MailboxAttribute::parse("\\Custom"),
                MailboxAttribute::Unknown("\\Custom".to_string())
            );
        }

        #[test]
        fn list_entry_helpers() {
            let entry = ListResponse {
                attributes: vec![MailboxAttribute::HasChildren, MailboxAttribute::Sent],
                delimiter: Some('/'),
                mailbox: Mailbox::new("Sent"),
            };
            assert_eq!(entry.special_use(), Some(&MailboxAttribute::Sent));
            assert!(!entry.is_noselect());

            let ghost = ListResponse {
                attributes: vec![MailboxAttribute::NonExistent],
                delimiter: Some('/'),
                mailbox: Mailbox::new("Gone"),
            };
            assert!(ghost.is_noselect());
        }
    }
}
