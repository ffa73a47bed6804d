//! Connection states (RFC 3501 section 3, plus the transport's own).

use std::fmt;

/// Where a connection stands.
///
/// ```text
/// Disconnected -> Connecting -> Greeted -> Authenticating -> Authenticated
///                                  \______ PREAUTH _______/     |    ^
///                                                               v    |
///                                                             Selected
/// any open state -> LoggedOut (LOGOUT) or Disconnected (failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport. Either never connected or failed.
    #[default]
    Disconnected,
    /// Transport open, waiting for the greeting.
    Connecting,
    /// Greeting received; not authenticated.
    Greeted,
    /// An AUTHENTICATE or LOGIN is in progress.
    Authenticating,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// A mailbox is selected.
    Selected,
    /// LOGOUT completed.
    LoggedOut,
}

impl ConnectionState {
    /// Returns `true` once logged in (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected)
    }

    /// Returns `true` while a mailbox is open.
    #[must_use]
    pub const fn is_selected(self) -> bool {
        matches!(self, Self::Selected)
    }

    /// Returns `true` while the transport can carry commands.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Connecting | Self::LoggedOut)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Greeted => "greeted",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Selected => "selected",
            Self::LoggedOut => "logged out",
        };
        f.write_str(name)
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
    fn test_state_predicates() {
        assert!(!ConnectionState::Greeted.is_authenticated());
        assert!(ConnectionState::Authenticated.is_authenticated());
        assert!(ConnectionState::Selected.is_authenticated());
        assert!(ConnectionState::Selected.is_selected());
        assert!(ConnectionState::Authenticating.is_open());
        assert!(!ConnectionState::Disconnected.is_open());
        assert!(!ConnectionState::LoggedOut.is_open());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
