//! Error types for the IMAP library.
//!
//! The variants fall into three groups that callers recover from differently:
//! connection failures (reconnect), credential failures (re-prompt) and
//! per-command failures (report and carry on).

use std::time::Duration;

use thiserror::Error;

use crate::types::{ResponseCode, Status};

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while establishing the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Network or TLS failure, timeout, or BYE before the protocol started.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Malformed local input, such as sequence-set text.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Malformed server data. Always fatal to the connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server rejected the credentials or the mechanism.
    #[error("Authentication with {mechanism} failed: {reason}")]
    Auth {
        /// Mechanism that was attempted (`PLAIN`, `LOGIN`, ...).
        mechanism: String,
        /// Server text, verbatim.
        reason: String,
    },

    /// The server answered NO or BAD to a command.
    #[error("Server returned {status:?}: {text}")]
    Command {
        /// `No` or `Bad`.
        status: Status,
        /// Response code from the tagged response, if any.
        code: Option<ResponseCode>,
        /// Server text, verbatim.
        text: String,
    },

    /// The connection closed or the server said BYE unexpectedly.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The caller abandoned the command.
    #[error("Command cancelled")]
    Cancelled,

    /// The server does not advertise a required capability.
    #[error("Server does not support {0}")]
    Unsupported(String),

    /// A pinned special-use mailbox cannot be changed this way.
    #[error("Special mailbox cannot be modified: {0}")]
    SpecialMailbox(String),

    /// Mailbox is not present in the folder tree.
    #[error("Mailbox not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A command argument cannot be encoded, such as an empty message set.
    /// Nothing was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Returns true if the connection cannot be used after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::InvalidDnsName(_)
                | Self::Connect(_)
                | Self::Protocol(_)
                | Self::ConnectionLost(_)
                | Self::Timeout(_)
        )
    }

    /// Returns true for credential or mechanism rejections.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns true for a NO/BAD reply scoped to a single command.
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(self, Self::Command { .. })
    }

    /// Returns the response code of a NO/BAD reply, if any.
    #[must_use]
    pub const fn response_code(&self) -> Option<&ResponseCode> {
        match self {
            Self::Command { code, .. } => code.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(Error::Protocol("bad literal".into()).is_fatal());
        assert!(Error::ConnectionLost("eof".into()).is_fatal());
        assert!(!Error::Cancelled.is_fatal());
        assert!(!Error::SpecialMailbox("INBOX".into()).is_fatal());
        assert!(!Error::InvalidArgument("empty set".into()).is_fatal());
    }

    #[test]
    fn command_error_keeps_text_and_code() {
        let err = Error::Command {
            status: Status::No,
            code: Some(ResponseCode::AlreadyExists),
            text: "Mailbox already exists".into(),
        };
        assert!(err.is_command());
        assert_eq!(err.response_code(), Some(&ResponseCode::AlreadyExists));
        assert!(err.to_string().ends_with("Mailbox already exists"));
    }

    #[test]
    fn auth_error_display() {
        let err = Error::Auth {
            mechanism: "PLAIN".into(),
            reason: "invalid credentials".into(),
        };
        assert!(err.is_auth());
        assert_eq!(
            err.to_string(),
            "Authentication with PLAIN failed: invalid credentials"
        );
    }
}
