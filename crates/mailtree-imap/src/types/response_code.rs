//! Response codes.

use super::{Capability, Flag, SeqNum, Uid, UidSet, UidValidity};

/// Bracketed response code carried by a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: text that must be shown to the user.
    Alert,
    /// CAPABILITY piggy-backed on a status response.
    Capability(Vec<Capability>),
    /// PARSE: the server could not parse a message.
    Parse,
    /// PERMANENTFLAGS: flags that can be changed permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: mailbox opened read-only.
    ReadOnly,
    /// READ-WRITE: mailbox opened read-write.
    ReadWrite,
    /// TRYCREATE: target mailbox does not exist but could be created.
    TryCreate,
    /// UIDNEXT: next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY of the mailbox.
    UidValidity(UidValidity),
    /// UNSEEN: first unseen message.
    Unseen(SeqNum),
    /// APPENDUID (UIDPLUS).
    AppendUid {
        /// UIDVALIDITY of the target mailbox.
        uidvalidity: UidValidity,
        /// UIDs assigned to the appended messages.
        uids: UidSet,
    },
    /// COPYUID (UIDPLUS).
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uidvalidity: UidValidity,
        /// Source UIDs.
        source: UidSet,
        /// Destination UIDs, in the same order.
        dest: UidSet,
    },
    /// HIGHESTMODSEQ (CONDSTORE).
    HighestModSeq(u64),
    /// NOMODSEQ: the mailbox has no mod-sequences.
    NoModSeq,
    /// ALREADYEXISTS (RFC 5530).
    AlreadyExists,
    /// NONEXISTENT (RFC 5530).
    Nonexistent,
    /// AUTHENTICATIONFAILED (RFC 5530).
    AuthenticationFailed,
    /// AUTHORIZATIONFAILED (RFC 5530).
    AuthorizationFailed,
    /// UNAVAILABLE (RFC 5530).
    Unavailable,
    /// CANNOT (RFC 5530).
    Cannot,
    /// Any other code. `args` is the raw text after the name.
    Unknown {
        /// Code name, upper-cased.
        name: String,
        /// Raw argument text, if any.
        args: Option<String>,
    },
}

impl ResponseCode {
    /// Maps an argument-less code name to its variant.
    #[must_use]
    pub fn from_atom(name: &str) -> Option<Self> {
        let code = match name.to_ascii_uppercase().as_str() {
            "ALERT" => Self::Alert,
            "PARSE" => Self::Parse,
            "READ-ONLY" => Self::ReadOnly,
            "READ-WRITE" => Self::ReadWrite,
            "TRYCREATE" => Self::TryCreate,
            "NOMODSEQ" => Self::NoModSeq,
            "ALREADYEXISTS" => Self::AlreadyExists,
            "NONEXISTENT" => Self::Nonexistent,
            "AUTHENTICATIONFAILED" => Self::AuthenticationFailed,
            "AUTHORIZATIONFAILED" => Self::AuthorizationFailed,
            "UNAVAILABLE" => Self::Unavailable,
            "CANNOT" => Self::Cannot,
            _ => return None,
        };
        Some(code)
    }

    /// Returns true for codes that mean the credentials were refused.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::AuthorizationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms() {
        assert_eq!(ResponseCode::from_atom("alreadyexists"), Some(ResponseCode::AlreadyExists));
        assert_eq!(ResponseCode::from_atom("READ-ONLY"), Some(ResponseCode::ReadOnly));
        assert_eq!(ResponseCode::from_atom("UIDNEXT"), None);
    }

    #[test]
    fn auth_failure_codes() {
        assert!(ResponseCode::AuthenticationFailed.is_auth_failure());
        assert!(!ResponseCode::TryCreate.is_auth_failure());
    }
}
