//! Server capabilities and response status.

use std::fmt;

/// Status of a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Greeting for a pre-authenticated session.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// A single advertised capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2,
    /// IDLE (RFC 2177)
    Idle,
    /// NAMESPACE (RFC 2342)
    Namespace,
    /// UIDPLUS (RFC 4315)
    UidPlus,
    /// MOVE (RFC 6851)
    Move,
    /// UNSELECT (RFC 3691)
    Unselect,
    /// LITERAL+ (RFC 7888)
    LiteralPlus,
    /// LITERAL- (RFC 7888)
    LiteralMinus,
    /// STARTTLS
    StartTls,
    /// LOGIN is disabled on this connection.
    LoginDisabled,
    /// SASL-IR (RFC 4959)
    SaslIr,
    /// ENABLE (RFC 5161)
    Enable,
    /// ID (RFC 2971)
    Id,
    /// SPECIAL-USE (RFC 6154)
    SpecialUse,
    /// CHILDREN (RFC 3348)
    Children,
    /// `AUTH=<mechanism>`, mechanism upper-cased.
    Auth(String),
    /// Anything else, verbatim.
    Unknown(String),
}

impl Capability {
    /// Parses a capability atom. Matching is case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "IDLE" => Self::Idle,
            "NAMESPACE" => Self::Namespace,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "UNSELECT" => Self::Unselect,
            "LITERAL+" => Self::LiteralPlus,
            "LITERAL-" => Self::LiteralMinus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "SASL-IR" => Self::SaslIr,
            "ENABLE" => Self::Enable,
            "ID" => Self::Id,
            "SPECIAL-USE" => Self::SpecialUse,
            "CHILDREN" => Self::Children,
            _ => match upper.strip_prefix("AUTH=") {
                Some(mech) => Self::Auth(mech.to_string()),
                None => Self::Unknown(s.to_string()),
            },
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Imap4Rev1 => "IMAP4rev1",
            Self::Imap4Rev2 => "IMAP4rev2",
            Self::Idle => "IDLE",
            Self::Namespace => "NAMESPACE",
            Self::UidPlus => "UIDPLUS",
            Self::Move => "MOVE",
            Self::Unselect => "UNSELECT",
            Self::LiteralPlus => "LITERAL+",
            Self::LiteralMinus => "LITERAL-",
            Self::StartTls => "STARTTLS",
            Self::LoginDisabled => "LOGINDISABLED",
            Self::SaslIr => "SASL-IR",
            Self::Enable => "ENABLE",
            Self::Id => "ID",
            Self::SpecialUse => "SPECIAL-USE",
            Self::Children => "CHILDREN",
            Self::Auth(mech) => return write!(f, "AUTH={mech}"),
            Self::Unknown(s) => s,
        };
        f.write_str(name)
    }
}

/// How the server accepts non-synchronizing literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralMode {
    /// Every literal waits for a continuation.
    Synchronizing,
    /// `LITERAL+`: any size may be sent without waiting.
    Plus,
    /// `LITERAL-`: up to 4096 bytes may be sent without waiting.
    Minus,
}

impl LiteralMode {
    /// Largest literal `LITERAL-` allows without a continuation.
    pub const MINUS_LIMIT: usize = 4096;

    /// Returns true if a literal of `len` bytes can skip the continuation.
    #[must_use]
    pub const fn allows_non_sync(self, len: usize) -> bool {
        match self {
            Self::Synchronizing => false,
            Self::Plus => true,
            Self::Minus => len <= Self::MINUS_LIMIT,
        }
    }
}

/// The capability set most recently advertised by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(Vec<Capability>);

impl Capabilities {
    /// Wraps a parsed capability list.
    #[must_use]
    pub const fn new(caps: Vec<Capability>) -> Self {
        Self(caps)
    }

    /// Returns true if the capability is advertised.
    #[must_use]
    pub fn has(&self, cap: &Capability) -> bool {
        self.0.contains(cap)
    }

    /// Returns true if `AUTH=<mechanism>` is advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.0
            .iter()
            .any(|c| matches!(c, Capability::Auth(m) if m.eq_ignore_ascii_case(mechanism)))
    }

    /// Advertised SASL mechanisms, in server order.
    pub fn auth_mechanisms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|c| match c {
            Capability::Auth(m) => Some(m.as_str()),
            _ => None,
        })
    }

    /// Returns true if the server speaks IMAP4rev1 or IMAP4rev2.
    #[must_use]
    pub fn is_imap4(&self) -> bool {
        self.has(&Capability::Imap4Rev1) || self.has(&Capability::Imap4Rev2)
    }

    /// Literal handling the server supports.
    #[must_use]
    pub fn literal_mode(&self) -> LiteralMode {
        if self.has(&Capability::LiteralPlus) {
            LiteralMode::Plus
        } else if self.has(&Capability::LiteralMinus) {
            LiteralMode::Minus
        } else {
            LiteralMode::Synchronizing
        }
    }

    /// Returns true if no capabilities are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the capabilities.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
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

    mod status_tests {
        use super::*;

        #[test]
        fn ok_and_preauth_are_ok() {
            assert!(Status::Ok.is_ok());
            assert!(Status::PreAuth.is_ok());
        }

        #[test]
        fn failures_are_not_ok() {
            assert!(!Status::No.is_ok());
            assert!(!Status::Bad.is_ok());
            assert!(!Status::Bye.is_ok());
        }
    }

    mod capability_parse_tests {
        use super::*;

        #[test]
        fn case_insensitive() {
            assert_eq!(Capability::parse("imap4rev1"), Capability::Imap4Rev1);
            assert_eq!(Capability::parse("Sasl-IR"), Capability::SaslIr);
            assert_eq!(Capability::parse("literal+"), Capability::LiteralPlus);
        }

        #[test]
        fn auth_mechanism_upper_cased() {
            assert_eq!(
                Capability::parse("auth=xoauth2"),
                Capability::Auth("XOAUTH2".to_string())
            );
        }

        #[test]
        fn unknown_kept_verbatim() {
            assert_eq!(
                Capability::parse("XYZZY"),
                Capability::Unknown("XYZZY".to_string())
            );
        }

        #[test]
        fn display() {
            assert_eq!(Capability::Imap4Rev1.to_string(), "IMAP4rev1");
            assert_eq!(Capability::Auth("PLAIN".into()).to_string(), "AUTH=PLAIN");
            assert_eq!(Capability::Unknown("X-FOO".into()).to_string(), "X-FOO");
        }
    }

    mod capabilities_tests {
        use super::*;

        fn caps(list: &[&str]) -> Capabilities {
            list.iter().map(|c| Capability::parse(c)).collect()
        }

        #[test]
        fn auth_lookup() {
            let caps = caps(&["IMAP4rev1", "AUTH=PLAIN", "AUTH=XOAUTH2"]);
            assert!(caps.supports_auth("plain"));
            assert!(!caps.supports_auth("LOGIN"));
            assert_eq!(caps.auth_mechanisms().collect::<Vec<_>>(), vec!["PLAIN", "XOAUTH2"]);
            assert!(caps.is_imap4());
        }

        #[test]
        fn literal_modes() {
            assert_eq!(caps(&["LITERAL+"]).literal_mode(), LiteralMode::Plus);
            assert_eq!(caps(&["LITERAL-"]).literal_mode(), LiteralMode::Minus);
            assert_eq!(caps(&[]).literal_mode(), LiteralMode::Synchronizing);
            assert!(LiteralMode::Minus.allows_non_sync(4096));
            assert!(!LiteralMode::Minus.allows_non_sync(4097));
            assert!(!LiteralMode::Synchronizing.allows_non_sync(1));
        }
    }
}
