//! Message flags.

use std::fmt;

/// A system flag or keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent`
    Recent,
    /// `\*` in PERMANENTFLAGS: new keywords may be created.
    MayCreate,
    /// Keyword or unknown system flag, verbatim.
    Keyword(String),
}

impl Flag {
    /// Parses a flag. System flags are matched case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            "\\*" => Self::MayCreate,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the wire form of the flag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::MayCreate => "\\*",
            Self::Keyword(s) => s,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of flags without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<Flag>);

impl Flags {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a flag if not present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: &Flag) {
        self.0.retain(|f| f != flag);
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    /// Returns true if `\Seen` is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// Returns true if `\Deleted` is set.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.contains(&Flag::Deleted)
    }

    /// Iterates over the flags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }

    /// Number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::vec::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_flags_case_insensitive() {
        assert_eq!(Flag::parse("\\seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\DELETED"), Flag::Deleted);
        assert_eq!(Flag::parse("\\*"), Flag::MayCreate);
    }

    #[test]
    fn keywords_verbatim() {
        assert_eq!(Flag::parse("$Forwarded"), Flag::Keyword("$Forwarded".into()));
        assert_eq!(Flag::Keyword("$Junk".into()).to_string(), "$Junk");
        assert_eq!(Flag::Answered.to_string(), "\\Answered");
    }

    #[test]
    fn collection_dedupes() {
        let mut flags: Flags = [Flag::Seen, Flag::Seen, Flag::Deleted].into_iter().collect();
        assert_eq!(flags.len(), 2);
        assert!(flags.is_seen());
        assert!(flags.is_deleted());
        flags.remove(&Flag::Seen);
        assert!(!flags.is_seen());
        flags.insert(Flag::Deleted);
        assert_eq!(flags.len(), 1);
    }
}
