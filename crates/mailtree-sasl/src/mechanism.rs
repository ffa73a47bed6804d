//! Mechanisms and the client side of an exchange.

use std::fmt;
use std::str::FromStr;

use crate::sasl::{self, OAuthFailure};
use crate::{Error, Result};

/// What the client authenticates with.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username and password.
    Password {
        /// Login name.
        username: String,
        /// Secret, sent only inside the SASL exchange.
        password: String,
    },
    /// OAuth 2.0 bearer token.
    Token {
        /// Account the token was issued for.
        user: String,
        /// The bearer token itself.
        access_token: String,
    },
}

impl Credentials {
    /// Creates password credentials.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates bearer-token credentials.
    #[must_use]
    pub fn token(user: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::Token {
            user: user.into(),
            access_token: access_token.into(),
        }
    }

    /// The user the credentials belong to.
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::Password { username, .. } => username,
            Self::Token { user, .. } => user,
        }
    }

    /// Returns true for bearer-token credentials.
    #[must_use]
    pub const fn is_token(&self) -> bool {
        matches!(self, Self::Token { .. })
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::Token { .. } => "token",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind())
            .field("user", &self.user())
            .finish_non_exhaustive()
    }
}

/// Supported SASL mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// `PLAIN` (RFC 4616).
    Plain,
    /// `LOGIN`, username and password as two challenges.
    Login,
    /// Google's `XOAUTH2`.
    XOAuth2,
    /// `OAUTHBEARER` (RFC 7628).
    OAuthBearer,
}

impl Mechanism {
    /// Default preference for password credentials.
    pub const PASSWORD_DEFAULTS: [Self; 2] = [Self::Plain, Self::Login];

    /// Default preference for token credentials.
    pub const TOKEN_DEFAULTS: [Self; 2] = [Self::OAuthBearer, Self::XOAuth2];

    /// The IANA mechanism name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }

    /// Returns true for mechanisms that carry a bearer token.
    #[must_use]
    pub const fn is_token_based(self) -> bool {
        matches!(self, Self::XOAuth2 | Self::OAuthBearer)
    }

    /// Returns true if the mechanism can start with a SASL-IR initial
    /// response.
    #[must_use]
    pub const fn has_initial_response(self) -> bool {
        !matches!(self, Self::Login)
    }

    /// Returns true if the mechanism can run with these credentials.
    #[must_use]
    pub const fn accepts(self, credentials: &Credentials) -> bool {
        self.is_token_based() == credentials.is_token()
    }

    /// Starts an exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialMismatch`] if the credentials cannot drive
    /// this mechanism.
    pub fn start(self, credentials: &Credentials) -> Result<Exchange<'_>> {
        if !self.accepts(credentials) {
            return Err(Error::CredentialMismatch {
                mechanism: self.name(),
                kind: credentials.kind(),
            });
        }
        Ok(Exchange {
            mechanism: self,
            credentials,
            step: 0,
            failure: None,
        })
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "LOGIN" => Ok(Self::Login),
            "XOAUTH2" => Ok(Self::XOAuth2),
            "OAUTHBEARER" => Ok(Self::OAuthBearer),
            other => Err(Error::UnsupportedMechanism(other.to_string())),
        }
    }
}

/// Client state of one authentication exchange.
///
/// Messages are base64-encoded in both directions, ready for the wire.
#[derive(Debug)]
pub struct Exchange<'a> {
    mechanism: Mechanism,
    credentials: &'a Credentials,
    step: usize,
    failure: Option<OAuthFailure>,
}

impl Exchange<'_> {
    /// Mechanism this exchange runs.
    #[must_use]
    pub const fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    /// The initial client response, if the mechanism has one.
    ///
    /// Consumes the first step; call it once, before any challenge.
    pub fn initial_response(&mut self) -> Option<String> {
        if !self.mechanism.has_initial_response() || self.step != 0 {
            return None;
        }
        self.step = 1;
        Some(sasl::encode(&self.first_message()))
    }

    /// Answers a server challenge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for a malformed challenge and
    /// [`Error::UnexpectedChallenge`] when the mechanism has nothing left
    /// to send.
    pub fn respond(&mut self, challenge: &str) -> Result<String> {
        let decoded = sasl::decode(challenge)?;
        let step = self.step;
        self.step += 1;

        let message = match (self.mechanism, step) {
            (Mechanism::Login, 0) => self.credentials.user().as_bytes().to_vec(),
            (Mechanism::Login, 1) => match self.credentials {
                Credentials::Password { password, .. } => password.as_bytes().to_vec(),
                Credentials::Token { .. } => Vec::new(),
            },
            // No initial response was sent, so the first challenge is empty.
            (_, 0) => self.first_message(),
            // OAuth servers report failure as a JSON challenge that has to be
            // acknowledged with an empty response before the tagged NO.
            (Mechanism::XOAuth2 | Mechanism::OAuthBearer, 1) => {
                self.failure = OAuthFailure::parse(&decoded).ok();
                if self.mechanism == Mechanism::OAuthBearer {
                    b"\x01".to_vec()
                } else {
                    Vec::new()
                }
            }
            (mechanism, step) => {
                return Err(Error::UnexpectedChallenge {
                    mechanism: mechanism.name(),
                    step,
                });
            }
        };
        Ok(sasl::encode(&message))
    }

    /// Failure details the server sent, for token mechanisms.
    #[must_use]
    pub const fn failure(&self) -> Option<&OAuthFailure> {
        self.failure.as_ref()
    }

    fn first_message(&self) -> Vec<u8> {
        match (self.mechanism, self.credentials) {
            (Mechanism::Plain, Credentials::Password { username, password }) => {
                sasl::plain(None, username, password)
            }
            (Mechanism::XOAuth2, Credentials::Token { user, access_token }) => {
                sasl::xoauth2(user, access_token)
            }
            (Mechanism::OAuthBearer, Credentials::Token { user, access_token }) => {
                sasl::oauthbearer(user, access_token, None)
            }
            _ => Vec::new(),
        }
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
    use crate::sasl::{decode, encode};

    #[test]
    fn names_round_trip() {
        for m in [
            Mechanism::Plain,
            Mechanism::Login,
            Mechanism::XOAuth2,
            Mechanism::OAuthBearer,
        ] {
            assert_eq!(m.name().parse::<Mechanism>().unwrap(), m);
        }
        assert_eq!("xoauth2".parse::<Mechanism>().unwrap(), Mechanism::XOAuth2);
        assert!(matches!(
            "CRAM-MD5".parse::<Mechanism>(),
            Err(Error::UnsupportedMechanism(_))
        ));
    }

    #[test]
    fn credential_mismatch() {
        let token = Credentials::token("a@b.c", "t");
        assert!(Mechanism::Plain.start(&token).is_err());
        assert!(Mechanism::XOAuth2.start(&token).is_ok());
        let password = Credentials::password("a", "b");
        assert!(Mechanism::OAuthBearer.start(&password).is_err());
    }

    #[test]
    fn plain_initial_response() {
        let creds = Credentials::password("test", "pass");
        let mut exchange = Mechanism::Plain.start(&creds).unwrap();
        assert_eq!(exchange.initial_response().unwrap(), "AHRlc3QAcGFzcw==");
        assert!(exchange.initial_response().is_none());
    }

    #[test]
    fn plain_without_sasl_ir() {
        let creds = Credentials::password("test", "pass");
        let mut exchange = Mechanism::Plain.start(&creds).unwrap();
        assert_eq!(exchange.respond("").unwrap(), "AHRlc3QAcGFzcw==");
        assert!(exchange.respond("").is_err());
    }

    #[test]
    fn login_two_steps() {
        let creds = Credentials::password("alice", "secret");
        let mut exchange = Mechanism::Login.start(&creds).unwrap();
        assert!(exchange.initial_response().is_none());
        let user = exchange.respond(&encode(b"Username:")).unwrap();
        let pass = exchange.respond(&encode(b"Password:")).unwrap();
        assert_eq!(decode(&user).unwrap(), b"alice");
        assert_eq!(decode(&pass).unwrap(), b"secret");
        assert!(matches!(
            exchange.respond(""),
            Err(Error::UnexpectedChallenge { step: 2, .. })
        ));
    }

    #[test]
    fn xoauth2_error_challenge() {
        let creds = Credentials::token("a@b.c", "expired");
        let mut exchange = Mechanism::XOAuth2.start(&creds).unwrap();
        exchange.initial_response().unwrap();
        let ack = exchange
            .respond(&encode(br#"{"status":"401","schemes":"bearer"}"#))
            .unwrap();
        assert_eq!(ack, "");
        assert_eq!(exchange.failure().unwrap().status, "401");
    }

    #[test]
    fn debug_hides_secrets() {
        let creds = Credentials::password("alice", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
