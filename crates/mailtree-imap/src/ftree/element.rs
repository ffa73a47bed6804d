//! Folder-tree elements.

use crate::types::{MailboxAttribute, NamespaceKind};

pub(crate) type NodeId = usize;

/// Role of a special-use mailbox (RFC 6154), plus INBOX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialUse {
    /// The INBOX.
    Inbox,
    /// `\Drafts`
    Drafts,
    /// `\Sent`
    Sent,
    /// `\Trash`
    Trash,
    /// `\Junk`
    Junk,
    /// `\Archive`
    Archive,
    /// `\All`
    All,
    /// `\Flagged`
    Flagged,
}

impl SpecialUse {
    /// Maps a LIST attribute to a role.
    #[must_use]
    pub const fn from_attribute(attr: &MailboxAttribute) -> Option<Self> {
        match attr {
            MailboxAttribute::Drafts => Some(Self::Drafts),
            MailboxAttribute::Sent => Some(Self::Sent),
            MailboxAttribute::Trash => Some(Self::Trash),
            MailboxAttribute::Junk => Some(Self::Junk),
            MailboxAttribute::Archive => Some(Self::Archive),
            MailboxAttribute::All => Some(Self::All),
            MailboxAttribute::Flagged => Some(Self::Flagged),
            _ => None,
        }
    }

    /// Roles whose mailboxes cannot be deleted or renamed.
    #[must_use]
    pub const fn is_pinned(self) -> bool {
        matches!(
            self,
            Self::Inbox | Self::Drafts | Self::Sent | Self::Trash | Self::Junk
        )
    }
}

/// One mailbox in the tree.
///
/// Containers are hierarchy levels that cannot hold messages: `\Noselect`
/// entries, levels the server never listed, and deleted mailboxes that still
/// have children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub(super) name: String,
    pub(super) label: String,
    pub(super) delimiter: Option<char>,
    pub(super) special_use: Option<SpecialUse>,
    pub(super) namespace: NamespaceKind,
    pub(super) subscribed: bool,
    pub(super) polled: bool,
    pub(super) open: bool,
    pub(super) container: bool,
    pub(super) no_inferiors: bool,
    pub(super) pinned: bool,
    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
}

impl Element {
    pub(super) fn new(name: &str, delimiter: Option<char>, namespace: NamespaceKind) -> Self {
        let inbox = name == "INBOX";
        Self {
            name: name.to_string(),
            label: label_of(name, delimiter).to_string(),
            delimiter,
            special_use: inbox.then_some(SpecialUse::Inbox),
            namespace,
            subscribed: inbox,
            polled: false,
            open: false,
            container: false,
            no_inferiors: false,
            pinned: inbox,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Full mailbox name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last hierarchy component, for display.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Hierarchy delimiter, `None` for a flat namespace.
    #[must_use]
    pub const fn delimiter(&self) -> Option<char> {
        self.delimiter
    }

    /// Special-use role from LIST, if any.
    #[must_use]
    pub const fn special_use(&self) -> Option<SpecialUse> {
        self.special_use
    }

    /// Namespace the element belongs to.
    #[must_use]
    pub const fn namespace(&self) -> NamespaceKind {
        self.namespace
    }

    /// Returns true for INBOX itself, not for other users' INBOXes.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.name == "INBOX"
    }

    /// Returns true if the mailbox is on the subscription list.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Returns true if the mailbox is checked for new mail.
    #[must_use]
    pub const fn is_polled(&self) -> bool {
        self.polled
    }

    /// Whether the element is expanded for display.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// `\Noselect` placeholder that only holds children.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        self.container
    }

    /// `\Noinferiors`: no child mailboxes can be created.
    #[must_use]
    pub const fn has_no_inferiors(&self) -> bool {
        self.no_inferiors
    }

    /// Pinned mailboxes cannot be deleted or renamed.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Returns true if any element sits below this one.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub(super) fn set_special_use(&mut self, role: SpecialUse) {
        self.special_use = Some(role);
        self.pinned |= role.is_pinned();
    }
}

/// Name of the parent level, if the name has one.
pub(super) fn parent_of(name: &str, delimiter: Option<char>) -> Option<&str> {
    let delimiter = delimiter?;
    name.rfind(delimiter)
        .map(|pos| &name[..pos])
        .filter(|parent| !parent.is_empty())
}

fn label_of(name: &str, delimiter: Option<char>) -> &str {
    match delimiter.and_then(|d| name.rsplit_once(d)) {
        Some((_, last)) if !last.is_empty() => last,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_and_parents() {
        let e = Element::new("Archive/2023/Q1", Some('/'), NamespaceKind::Personal);
        assert_eq!(e.label(), "Q1");
        assert_eq!(parent_of(e.name(), e.delimiter()), Some("Archive/2023"));
        assert_eq!(parent_of("Archive", Some('/')), None);
        assert_eq!(parent_of("/odd", Some('/')), None);
        assert_eq!(parent_of("a/b", None), None);
    }

    #[test]
    fn inbox_defaults() {
        let e = Element::new("INBOX", Some('.'), NamespaceKind::Personal);
        assert!(e.is_inbox());
        assert!(e.is_pinned());
        assert!(e.is_subscribed());
        assert_eq!(e.special_use(), Some(SpecialUse::Inbox));
    }

    #[test]
    fn pinned_roles() {
        assert!(SpecialUse::Trash.is_pinned());
        assert!(!SpecialUse::Archive.is_pinned());
        assert_eq!(SpecialUse::from_attribute(&MailboxAttribute::Junk), Some(SpecialUse::Junk));
        assert_eq!(SpecialUse::from_attribute(&MailboxAttribute::NoSelect), None);
    }
}
