//! Error types for SASL exchanges.

/// Result type alias for SASL operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SASL error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The mechanism name is not one this crate implements.
    #[error("unsupported SASL mechanism: {0}")]
    UnsupportedMechanism(String),

    /// The credentials cannot drive this mechanism (a token for PLAIN, a
    /// password for XOAUTH2).
    #[error("{mechanism} cannot be used with {kind} credentials")]
    CredentialMismatch {
        /// Mechanism name.
        mechanism: &'static str,
        /// `password` or `token`.
        kind: &'static str,
    },

    /// The server sent more challenges than the mechanism has steps.
    #[error("unexpected {mechanism} challenge at step {step}")]
    UnexpectedChallenge {
        /// Mechanism name.
        mechanism: &'static str,
        /// Zero-based step that received the challenge.
        step: usize,
    },

    /// A challenge was not valid base64.
    #[error("invalid challenge encoding: {0}")]
    Decode(#[from] base64::DecodeError),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
