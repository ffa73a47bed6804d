//! NAMESPACE data (RFC 2342).

/// Which of the three namespace groups an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// The user's own mailboxes.
    Personal,
    /// Other users' mailboxes.
    OtherUsers,
    /// Shared mailboxes.
    Shared,
}

/// One namespace entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Name prefix, possibly empty.
    pub prefix: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
}

/// Parsed NAMESPACE response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    /// Personal namespaces.
    pub personal: Vec<Namespace>,
    /// Other users' namespaces.
    pub other_users: Vec<Namespace>,
    /// Shared namespaces.
    pub shared: Vec<Namespace>,
}

impl Namespaces {
    /// Classifies a mailbox name by the longest matching non-empty prefix.
    /// Names that match nothing are personal.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> NamespaceKind {
        let groups = [
            (NamespaceKind::Personal, &self.personal),
            (NamespaceKind::OtherUsers, &self.other_users),
            (NamespaceKind::Shared, &self.shared),
        ];

        groups
            .iter()
            .flat_map(|(kind, list)| list.iter().map(move |ns| (*kind, ns)))
            .filter(|(_, ns)| !ns.prefix.is_empty() && name.starts_with(&ns.prefix))
            .max_by_key(|(_, ns)| ns.prefix.len())
            .map_or(NamespaceKind::Personal, |(kind, _)| kind)
    }

    /// Delimiter of the first personal namespace.
    #[must_use]
    pub fn personal_delimiter(&self) -> Option<char> {
        self.personal.first().and_then(|ns| ns.delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(prefix: &str) -> Namespace {
        Namespace {
            prefix: prefix.to_string(),
            delimiter: Some('/'),
        }
    }

    #[test]
    fn classifies_by_prefix() {
        let namespaces = Namespaces {
            personal: vec![ns("")],
            other_users: vec![ns("Other Users/")],
            shared: vec![ns("Shared/")],
        };
        assert_eq!(namespaces.kind_of("INBOX"), NamespaceKind::Personal);
        assert_eq!(namespaces.kind_of("Other Users/bob/INBOX"), NamespaceKind::OtherUsers);
        assert_eq!(namespaces.kind_of("Shared/team"), NamespaceKind::Shared);
        assert_eq!(namespaces.personal_delimiter(), Some('/'));
    }
}
