//! LOGIN, AUTHENTICATE and ENABLE.

use mailtree_sasl::{Credentials, Mechanism};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Connection, ConnectionState, Step};
use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::pipeline::CommandResult;
use crate::types::Capability;
use crate::{Error, Result};

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Logs in with the `LOGIN` command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] if the server advertises
    /// `LOGINDISABLED`, [`Error::Auth`] if the credentials are rejected.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.require_greeted("LOGIN")?;
        if self.capabilities.has(&Capability::LoginDisabled) {
            return Err(Error::Unsupported("LOGIN".into()));
        }
        let result = self.login_command(username, password).await?;
        self.authenticated(&result).await
    }

    /// Authenticates with the first usable mechanism.
    ///
    /// Candidates come from [`Config::auth_mechanisms`](super::Config), or
    /// the defaults for the credential kind, restricted to what the server
    /// advertises. `LOGIN` falls back to the `LOGIN` command when the server
    /// does not offer it as a SASL mechanism and has not disabled it.
    ///
    /// A rejection ends the attempt unless `allow_auth_fallback` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] if no mechanism is usable,
    /// [`Error::Auth`] for a rejection, or [`Error::ConnectionLost`] if the
    /// server hangs up.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        self.require_greeted("AUTHENTICATE")?;

        let mut candidates = self.mechanism_candidates(credentials).into_iter().peekable();
        if candidates.peek().is_none() {
            let offered: Vec<&str> = self.capabilities.auth_mechanisms().collect();
            return Err(Error::Unsupported(format!(
                "no usable mechanism for {} credentials (server offers {})",
                if credentials.is_token() { "token" } else { "password" },
                offered.join(" ")
            )));
        }

        while let Some(mechanism) = candidates.next() {
            match self.try_mechanism(mechanism, credentials).await {
                Ok(result) => return self.authenticated(&result).await,
                Err(err)
                    if err.is_auth()
                        && self.config.allow_auth_fallback
                        && candidates.peek().is_some() =>
                {
                    tracing::warn!(%mechanism, error = %err, "authentication failed, trying next mechanism");
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::InvalidState("authentication ended without an outcome".into()))
    }

    /// Enables extensions (RFC 5161). Returns what the server enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] without the ENABLE capability.
    pub async fn enable(&mut self, extensions: &[&str]) -> Result<Vec<Capability>> {
        self.require_authenticated("ENABLE")?;
        if !self.capabilities.has(&Capability::Enable) {
            return Err(Error::Unsupported("ENABLE".into()));
        }
        let command = Command::Enable {
            capabilities: extensions.iter().map(|e| (*e).to_string()).collect(),
        };
        let result = self.run(&command).await?;
        Ok(result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Enabled(caps) => Some(caps),
                _ => None,
            })
            .flatten()
            .collect())
    }

    fn mechanism_candidates(&self, credentials: &Credentials) -> Vec<Mechanism> {
        let preference: &[Mechanism] = if !self.config.auth_mechanisms.is_empty() {
            &self.config.auth_mechanisms
        } else if credentials.is_token() {
            &Mechanism::TOKEN_DEFAULTS
        } else {
            &Mechanism::PASSWORD_DEFAULTS
        };

        preference
            .iter()
            .copied()
            .filter(|m| m.accepts(credentials))
            .filter(|m| {
                self.capabilities.supports_auth(m.name())
                    || (*m == Mechanism::Login && !self.capabilities.has(&Capability::LoginDisabled))
            })
            .collect()
    }

    async fn try_mechanism(
        &mut self,
        mechanism: Mechanism,
        credentials: &Credentials,
    ) -> Result<CommandResult> {
        let name = mechanism.name();
        if mechanism == Mechanism::Login
            && !self.capabilities.supports_auth(name)
            && let Credentials::Password { username, password } = credentials
        {
            return self.login_command(username, password).await;
        }

        let mut exchange = mechanism.start(credentials).map_err(|err| Error::Auth {
            mechanism: name.to_string(),
            reason: err.to_string(),
        })?;
        let initial_response = if self.capabilities.has(&Capability::SaslIr) {
            exchange.initial_response()
        } else {
            None
        };

        self.transition(ConnectionState::Authenticating);
        let handle = self.send(&Command::Authenticate {
            mechanism: name.to_string(),
            initial_response,
        })?;

        loop {
            match self.next_step(&handle).await {
                Ok(Step::Completed(result)) => return Ok(result),
                Ok(Step::Continuation(challenge)) => match exchange.respond(&challenge) {
                    Ok(response) => self.continue_with(&handle, response.as_bytes()).await?,
                    Err(err) => {
                        self.cancel(&handle).await?;
                        self.pipeline.take_result(&handle);
                        self.transition(ConnectionState::Greeted);
                        return Err(Error::Auth {
                            mechanism: name.to_string(),
                            reason: err.to_string(),
                        });
                    }
                },
                Err(err) => {
                    if let Some(failure) = exchange.failure() {
                        tracing::debug!(status = %failure.status, scope = ?failure.scope, "token rejected");
                    }
                    return Err(self.auth_failed(name, err));
                }
            }
        }
    }

    async fn login_command(&mut self, username: &str, password: &str) -> Result<CommandResult> {
        self.transition(ConnectionState::Authenticating);
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.run(&command).await {
            Ok(result) => Ok(result),
            Err(err) => Err(self.auth_failed("LOGIN", err)),
        }
    }

    /// Maps a NO/BAD to [`Error::Auth`]; fatal errors pass through.
    fn auth_failed(&mut self, mechanism: &str, err: Error) -> Error {
        match err {
            Error::Command { text, .. } => {
                self.transition(ConnectionState::Greeted);
                Error::Auth {
                    mechanism: mechanism.to_string(),
                    reason: text,
                }
            }
            other => other,
        }
    }

    async fn authenticated(&mut self, result: &CommandResult) -> Result<()> {
        self.transition(ConnectionState::Authenticated);
        if let Some(caps) = result.capabilities() {
            self.set_capabilities(caps.iter().cloned().collect());
        } else {
            self.negotiate_capabilities().await?;
        }
        Ok(())
    }

    fn require_greeted(&self, command: &str) -> Result<()> {
        if self.state == ConnectionState::Greeted {
            Ok(())
        } else {
            Err(self.wrong_state(command))
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
    use tokio_test::io::Builder;

    use super::super::tests::connect;
    use super::super::{Config, Security};
    use super::*;

    #[tokio::test]
    async fn plain_with_sasl_ir_and_piggybacked_capabilities() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] welcome\r\n")
            .build();
        let mut conn = connect(mock).await;
        conn.authenticate(&Credentials::password("user", "pass"))
            .await
            .unwrap();
        assert_eq!(conn.state(), ConnectionState::Authenticated);
        assert!(conn.capabilities().has(&Capability::Idle));
    }

    #[tokio::test]
    async fn plain_without_sasl_ir_then_capability() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN\r\n")
            .read(b"+ \r\n")
            .write(b"AHVzZXIAcGFzcw==\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 NAMESPACE\r\nA0002 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        conn.authenticate(&Credentials::password("user", "pass"))
            .await
            .unwrap();
        assert!(conn.capabilities().has(&Capability::Namespace));
    }

    #[tokio::test]
    async fn rejection_without_fallback() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN AUTH=LOGIN] ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN AHVzZXIAd3Jvbmc=\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let mut conn = connect(mock).await;
        let err = conn
            .authenticate(&Credentials::password("user", "wrong"))
            .await
            .unwrap_err();
        match err {
            Error::Auth { mechanism, reason } => {
                assert_eq!(mechanism, "PLAIN");
                assert_eq!(reason, "Invalid credentials");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(conn.state(), ConnectionState::Greeted);
    }

    #[tokio::test]
    async fn fallback_to_login_command() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN AHUAcA==\r\n")
            .read(b"A0001 NO nope\r\n")
            .write(b"A0002 LOGIN u p\r\n")
            .read(b"A0002 OK [CAPABILITY IMAP4rev1] in\r\n")
            .build();
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .allow_auth_fallback(true)
            .build();
        let mut conn = Connection::from_stream(mock, config).await.unwrap();
        conn.authenticate(&Credentials::password("u", "p")).await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn login_disabled_leaves_nothing_for_passwords() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LOGINDISABLED AUTH=XOAUTH2] ready\r\n")
            .build();
        let mut conn = connect(mock).await;
        assert!(matches!(
            conn.authenticate(&Credentials::password("u", "p")).await,
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(conn.login("u", "p").await, Err(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn xoauth2_error_challenge() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .write(b"A0001 AUTHENTICATE XOAUTH2 dXNlcj1hQGIuYwFhdXRoPUJlYXJlciB0AQE=\r\n")
            .read(b"+ eyJzdGF0dXMiOiI0MDEifQ==\r\n")
            .write(b"\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] token expired\r\n")
            .build();
        let mut conn = connect(mock).await;
        let err = conn
            .authenticate(&Credentials::token("a@b.c", "t"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth { ref reason, .. } if reason == "token expired"));
    }

    #[tokio::test]
    async fn bye_during_authentication() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN AHUAcA==\r\n")
            .read(b"* BYE go away\r\n")
            .build();
        let mut conn = connect(mock).await;
        let err = conn
            .authenticate(&Credentials::password("u", "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn login_quotes_password() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN alice \"p w\"\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] hi\r\n")
            .build();
        let mut conn = connect(mock).await;
        conn.login("alice", "p w").await.unwrap();
        assert!(conn.capabilities().has(&Capability::Idle));
    }
}
