//! SASL message builders.
//!
//! Builders return the raw client message; [`encode`] turns it into the
//! base64 form IMAP puts on the wire.
//!
//! - PLAIN (RFC 4616)
//! - LOGIN (draft-murchison-sasl-login)
//! - OAUTHBEARER (RFC 7628)
//! - XOAUTH2 (Google/Microsoft)

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::Result;

/// Base64-encodes a client message. An empty message stays empty; as an
/// initial response it has to be sent as `=`.
#[must_use]
pub fn encode(message: &[u8]) -> String {
    STANDARD.encode(message)
}

/// Decodes a server challenge. Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`crate::Error::Decode`] if the challenge is not base64.
pub fn decode(challenge: &str) -> Result<Vec<u8>> {
    let challenge = challenge.trim();
    if challenge.is_empty() || challenge == "=" {
        return Ok(Vec::new());
    }
    Ok(STANDARD.decode(challenge)?)
}

/// PLAIN message: `authzid NUL authcid NUL password`.
///
/// # Example
///
/// ```
/// use mailtree_sasl::sasl::{encode, plain};
///
/// assert_eq!(encode(&plain(None, "test", "pass")), "AHRlc3QAcGFzcw==");
/// ```
#[must_use]
pub fn plain(authzid: Option<&str>, username: &str, password: &str) -> Vec<u8> {
    let authzid = authzid.unwrap_or_default();
    format!("{authzid}\0{username}\0{password}").into_bytes()
}

/// OAUTHBEARER message. `host` adds the optional `host=` and `port=` keys.
#[must_use]
pub fn oauthbearer(user: &str, token: &str, host: Option<(&str, u16)>) -> Vec<u8> {
    let mut message = format!("n,a={},\x01", escape_saslname(user));
    if let Some((host, port)) = host {
        message.push_str(&format!("host={host}\x01port={port}\x01"));
    }
    message.push_str(&format!("auth=Bearer {token}\x01\x01"));
    message.into_bytes()
}

/// XOAUTH2 message: `user=<user>^Aauth=Bearer <token>^A^A`.
#[must_use]
pub fn xoauth2(user: &str, token: &str) -> Vec<u8> {
    format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes()
}

/// GS2 `saslname` escaping: `,` and `=` are not allowed verbatim.
fn escape_saslname(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

/// Failure details an OAuth server sends as its final challenge.
///
/// The JSON looks like `{"status":"401","schemes":"bearer","scope":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct OAuthFailure {
    /// HTTP-style status code.
    pub status: String,
    /// Auth schemes the server accepts instead.
    #[serde(default)]
    pub schemes: Option<String>,
    /// Scope the token would need.
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuthFailure {
    /// Parses a decoded OAuth error challenge.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the challenge is not the expected
    /// JSON object.
    pub fn parse(challenge: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(challenge)?)
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
    fn plain_format() {
        assert_eq!(plain(None, "test", "pass"), b"\0test\0pass");
        assert_eq!(plain(Some("admin"), "u", "p@ss!"), b"admin\0u\0p@ss!");
    }

    #[test]
    fn oauthbearer_format() {
        assert_eq!(
            oauthbearer("test@test.com", "abc", None),
            b"n,a=test@test.com,\x01auth=Bearer abc\x01\x01"
        );
        assert_eq!(
            oauthbearer("a,b=c", "t", Some(("imap.example.com", 993))),
            b"n,a=a=2Cb=3Dc,\x01host=imap.example.com\x01port=993\x01auth=Bearer t\x01\x01"
        );
    }

    #[test]
    fn xoauth2_format() {
        assert_eq!(
            xoauth2("test@test.com", "abc"),
            b"user=test@test.com\x01auth=Bearer abc\x01\x01"
        );
    }

    #[test]
    fn encode_and_decode() {
        let wire = encode(&xoauth2("user@example.com", "token"));
        assert!(!wire.contains("user@example.com"));
        assert_eq!(decode(&wire).unwrap(), xoauth2("user@example.com", "token"));
        assert_eq!(encode(b""), "");
        assert!(decode("=").unwrap().is_empty());
        assert!(decode("not base64!").is_err());
    }

    #[test]
    fn oauth_failure() {
        let json = br#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#;
        let failure = OAuthFailure::parse(json).unwrap();
        assert_eq!(failure.status, "401");
        assert_eq!(failure.scope.as_deref(), Some("https://mail.google.com/"));
        assert!(OAuthFailure::parse(b"nope").is_err());
    }
}
