//! IMAP connection management.
//!
//! A [`Connection`] owns one transport and drives a [`Pipeline`] over it.
//! Every operation takes `&mut self`, so commands on one connection are
//! sequenced by the borrow checker; concurrency comes from opening several
//! connections.
//!
//! - Configuration (host, port, security mode, timeouts, pipelining)
//! - TLS/plaintext stream abstraction
//! - Framed I/O on top of the streaming decoder
//! - Authentication, mailbox and message commands
//! - IDLE with a watchdog
//!
//! Untagged mailbox updates are applied to the selected-mailbox state as
//! soon as they arrive and forwarded to the installed
//! [`EventHandler`](crate::handler::EventHandler).
//!
//! Any transport failure, malformed server data, I/O timeout or unexpected
//! BYE is fatal: the connection drops its transport, moves to
//! [`ConnectionState::Disconnected`], and rejects every pending command with
//! [`Error::ConnectionLost`].

mod auth;
mod config;
mod framed;
mod idle;
mod mailbox;
mod messages;
mod selected;
mod state;
mod stream;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

pub use config::{Config, ConfigBuilder, PipelineMode, Security};
pub use framed::FramedStream;
pub use idle::{IdleEvent, IdleHandle};
pub use messages::Fetched;
pub use selected::SelectedMailbox;
pub use state::ConnectionState;
pub use stream::{ImapStream, connect_plain, connect_tls, create_tls_connector, open};

use crate::command::Command;
use crate::handler::{EventHandler, LoggingHandler, MailboxEvent};
use crate::parser::{Response, UntaggedResponse};
use crate::pipeline::{CommandHandle, CommandResult, Dispatch, Pipeline};
use crate::types::{Capabilities, Capability, ResponseCode, Status};
use crate::{Error, Result};

/// Progress of a command that may ask for continuation data.
#[derive(Debug, Clone)]
pub enum Step {
    /// The command completed with `OK`.
    Completed(CommandResult),
    /// The server sent `+` and waits for
    /// [`Connection::continue_with`] or [`Connection::cancel`].
    Continuation(String),
}

/// An IMAP client connection.
pub struct Connection<S = ImapStream> {
    config: Config,
    framed: Option<FramedStream<S>>,
    state: ConnectionState,
    capabilities: Capabilities,
    greeting: String,
    pipeline: Pipeline,
    selected: Option<SelectedMailbox>,
    handler: Box<dyn EventHandler>,
    logging_out: bool,
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .field("selected", &self.selected.as_ref().map(SelectedMailbox::mailbox))
            .finish_non_exhaustive()
    }
}

impl Connection<ImapStream> {
    /// Connects to the configured server and reads the greeting.
    ///
    /// Capabilities are requested if the greeting did not carry them. With
    /// [`Security::StartTls`] the connection is upgraded before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the server cannot be reached, the
    /// greeting does not arrive within `connect_timeout`, or the server
    /// greets with BYE.
    pub async fn connect(config: Config) -> Result<Self> {
        tracing::info!(host = %config.host, port = config.port, security = ?config.security, "connecting");
        let stream = stream::open(&config).await?;
        let security = config.security;
        let mut conn = Self::from_stream(stream, config).await?;

        if conn.capabilities.is_empty() {
            conn.negotiate_capabilities().await?;
        }
        if security == Security::StartTls && conn.state == ConnectionState::Greeted {
            conn.starttls().await?;
        }
        Ok(conn)
    }

    /// Upgrades the connection with STARTTLS and re-reads the capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside the greeted state,
    /// [`Error::Unsupported`] if the server does not offer STARTTLS, or a
    /// fatal error if the handshake fails.
    pub async fn starttls(&mut self) -> Result<()> {
        if self.state != ConnectionState::Greeted {
            return Err(self.wrong_state("STARTTLS"));
        }
        if self.framed.as_ref().is_some_and(|f| f.get_ref().is_tls()) {
            return Err(Error::InvalidState("connection is already encrypted".into()));
        }
        if !self.capabilities.has(&Capability::StartTls) {
            return Err(Error::Unsupported("STARTTLS".into()));
        }

        self.run(&Command::StartTls).await?;

        let Some(framed) = self.framed.take() else {
            return Err(self.abort(Error::ConnectionLost("transport gone".into())));
        };
        match framed.into_inner().upgrade_to_tls(&self.config.host).await {
            Ok(tls) => self.framed = Some(FramedStream::new(tls)),
            Err(err) => return Err(self.abort(err)),
        }
        tracing::info!(host = %self.config.host, "TLS established");

        // Capabilities learned before the upgrade are no longer trusted.
        self.set_capabilities(Capabilities::default());
        self.negotiate_capabilities().await?;
        Ok(())
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Reads the greeting from an already connected stream.
    ///
    /// Nothing is written. `OK` leads to [`ConnectionState::Greeted`],
    /// `PREAUTH` to [`ConnectionState::Authenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] on BYE, a timeout, or anything other than
    /// an untagged greeting.
    pub async fn from_stream(stream: S, config: Config) -> Result<Self> {
        let pipeline = Pipeline::new(config.pipeline_config());
        let mut conn = Self {
            framed: Some(FramedStream::new(stream)),
            state: ConnectionState::Connecting,
            capabilities: Capabilities::default(),
            greeting: String::new(),
            pipeline,
            selected: None,
            handler: Box::new(LoggingHandler),
            logging_out: false,
            config,
        };

        let limit = conn.config.connect_timeout;
        let greeting = match conn.receive(limit).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                conn.abort(Error::Timeout(limit));
                return Err(Error::Connect(format!("no greeting within {limit:?}")));
            }
            Err(err) => return Err(Error::Connect(format!("reading greeting: {err}"))),
        };

        let Response::Untagged(UntaggedResponse::Condition { status, code, text }) = greeting else {
            conn.abort(Error::Protocol("greeting is not an untagged status".into()));
            return Err(Error::Connect("unexpected greeting".into()));
        };

        if let Some(ResponseCode::Capability(caps)) = code {
            conn.set_capabilities(caps.into_iter().collect());
        }
        conn.greeting = text;

        match status {
            Status::Ok => conn.transition(ConnectionState::Greeted),
            Status::PreAuth => conn.transition(ConnectionState::Authenticated),
            Status::Bye => {
                let reason = conn.greeting.clone();
                conn.abort(Error::ConnectionLost(reason.clone()));
                return Err(Error::Connect(format!("server refused connection: {reason}")));
            }
            Status::No | Status::Bad => {
                conn.abort(Error::Protocol("greeting with NO/BAD".into()));
                return Err(Error::Connect(format!("unexpected greeting: {}", conn.greeting)));
            }
        }
        Ok(conn)
    }

    /// Where the connection is in the protocol state machine.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Configuration the connection was opened with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The capability set most recently advertised.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Text of the server greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// The selected mailbox, if any.
    #[must_use]
    pub const fn selected(&self) -> Option<&SelectedMailbox> {
        self.selected.as_ref()
    }

    /// Installs the receiver of mailbox-update events.
    pub fn set_handler(&mut self, handler: impl EventHandler + 'static) {
        self.handler = Box::new(handler);
    }

    /// Issues `CAPABILITY` and stores the result.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn negotiate_capabilities(&mut self) -> Result<&Capabilities> {
        let result = self.run(&Command::Capability).await?;
        let caps = result.capabilities().map(<[Capability]>::to_vec).unwrap_or_default();
        self.set_capabilities(caps.into_iter().collect());
        Ok(&self.capabilities)
    }

    /// Same as [`Self::negotiate_capabilities`].
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn capability(&mut self) -> Result<&Capabilities> {
        self.negotiate_capabilities().await
    }

    /// Sends `NOOP`, which also collects pending mailbox updates.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn noop(&mut self) -> Result<()> {
        self.run(&Command::Noop).await.map(drop)
    }

    /// Logs out and closes the transport.
    ///
    /// # Errors
    ///
    /// Returns the command's error. A transport that closes right after the
    /// BYE counts as success.
    pub async fn logout(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.logging_out = true;
        let outcome = self.run(&Command::Logout).await;
        self.framed = None;
        self.selected = None;
        self.transition(ConnectionState::LoggedOut);
        match outcome {
            Ok(_) | Err(Error::ConnectionLost(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Enqueues a command without waiting for it.
    ///
    /// Nothing is written until [`Self::flush`] or [`Self::wait`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the connection is closed, and
    /// [`Error::InvalidArgument`] for a command that would go out malformed.
    pub fn send(&mut self, command: &Command) -> Result<CommandHandle> {
        self.ensure_open()?;
        self.pipeline.enqueue(command)
    }

    /// Writes everything the pipeline allows to send now.
    ///
    /// # Errors
    ///
    /// Write failures and timeouts are fatal.
    pub async fn flush(&mut self) -> Result<()> {
        while let Some(transmit) = self.pipeline.poll_transmit() {
            let limit = self.config.io_timeout;
            let Some(framed) = self.framed.as_mut() else {
                return Err(self.abort(Error::ConnectionLost("transport gone".into())));
            };
            let written = match tokio::time::timeout(limit, framed.write_all(transmit.as_ref())).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(limit)),
            };
            if let Err(err) = written {
                return Err(self.abort(err));
            }
        }
        Ok(())
    }

    /// Waits for a command to complete.
    ///
    /// Responses for other commands are processed along the way. A `NO` or
    /// `BAD` becomes [`Error::Command`] with the server text verbatim.
    ///
    /// # Errors
    ///
    /// Returns the command's outcome, or a fatal error. A command that asks
    /// for continuation data is cancelled and reported as
    /// [`Error::InvalidState`].
    pub async fn wait(&mut self, handle: &CommandHandle) -> Result<CommandResult> {
        match self.next_step(handle).await? {
            Step::Completed(result) => Ok(result),
            Step::Continuation(_) => {
                self.cancel(handle).await?;
                self.pipeline.take_result(handle);
                Err(Error::InvalidState(format!(
                    "{} expects continuation data",
                    handle.tag()
                )))
            }
        }
    }

    /// Waits until a command completes or the server asks it for data.
    ///
    /// # Errors
    ///
    /// Same as [`Self::wait`].
    pub async fn next_step(&mut self, handle: &CommandHandle) -> Result<Step> {
        let outcome = self.drive(handle).await;
        if outcome.is_err() {
            self.pipeline.take_result(handle);
        }
        outcome
    }

    async fn drive(&mut self, handle: &CommandHandle) -> Result<Step> {
        loop {
            self.flush().await?;
            if let Some(outcome) = self.pipeline.take_result(handle) {
                return outcome.map(Step::Completed);
            }
            if !self.pipeline.is_pending(handle) {
                return Err(Error::InvalidState(format!("{} is not pending", handle.tag())));
            }

            let limit = self.config.io_timeout;
            let Some(response) = self.receive(limit).await? else {
                return Err(self.abort(Error::Timeout(limit)));
            };
            if let Dispatch::Continuation { handle: asked, text } = self.dispatch(response)?
                && asked == *handle
            {
                return Ok(Step::Continuation(text));
            }
        }
    }

    /// Answers a continuation request; `payload` is sent followed by CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the command is not waiting for
    /// data, or a fatal write error.
    pub async fn continue_with(&mut self, handle: &CommandHandle, payload: &[u8]) -> Result<()> {
        self.pipeline.continue_with(handle, payload)?;
        self.flush().await
    }

    /// Abandons a command. Its result becomes [`Error::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the command already completed, or
    /// a fatal write error.
    pub async fn cancel(&mut self, handle: &CommandHandle) -> Result<()> {
        self.pipeline.cancel(handle)?;
        self.flush().await
    }

    /// Sends a command and waits for it.
    pub(crate) async fn run(&mut self, command: &Command) -> Result<CommandResult> {
        let handle = self.send(command)?;
        self.wait(&handle).await
    }

    /// Reads one response. `Ok(None)` means `limit` elapsed.
    async fn receive(&mut self, limit: Duration) -> Result<Option<Response>> {
        let Some(framed) = self.framed.as_mut() else {
            return Err(Error::ConnectionLost("not connected".into()));
        };
        let read = tokio::time::timeout(limit, framed.read_response()).await;
        match read {
            Err(_) => Ok(None),
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(err)) => Err(self.abort(err)),
        }
    }

    /// Applies side effects of a response and hands it to the pipeline.
    fn dispatch(&mut self, response: Response) -> Result<Dispatch> {
        match &response {
            Response::Untagged(data) => self.observe(data)?,
            Response::Tagged {
                code: Some(ResponseCode::Alert),
                text,
                ..
            } => self.handler.on_event(MailboxEvent::Alert(text.clone())),
            _ => {}
        }
        self.pipeline.handle_response(response).map_err(|err| self.abort(err))
    }

    fn observe(&mut self, data: &UntaggedResponse) -> Result<()> {
        match data {
            UntaggedResponse::Condition {
                status: Status::Bye,
                text,
                ..
            } => {
                if self.logging_out {
                    tracing::info!(text, "server closing connection");
                    return Ok(());
                }
                tracing::warn!(text, "unexpected BYE");
                self.handler.on_event(MailboxEvent::Bye(text.clone()));
                return Err(self.abort(Error::ConnectionLost(format!("server said BYE: {text}"))));
            }
            UntaggedResponse::Condition {
                code: Some(ResponseCode::Alert),
                text,
                ..
            } => self.handler.on_event(MailboxEvent::Alert(text.clone())),
            UntaggedResponse::Condition {
                code: Some(ResponseCode::Capability(caps)),
                ..
            }
            | UntaggedResponse::Capability(caps) => {
                self.set_capabilities(caps.iter().cloned().collect());
            }
            _ => {}
        }

        let solicited = self.pipeline.expects_fetch_data();
        if let Some(selected) = self.selected.as_mut()
            && let Some(event) = selected.apply(data)
            && !(solicited && matches!(event, MailboxEvent::FlagsChanged { .. }))
        {
            self.handler.on_event(event);
        }
        Ok(())
    }

    fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.pipeline.set_literal_mode(capabilities.literal_mode());
        self.pipeline
            .set_enabled(self.config.pipelining.is_active(&capabilities));
        self.capabilities = capabilities;
    }

    /// Tears the connection down after a fatal error.
    ///
    /// Every pending command is rejected with [`Error::ConnectionLost`].
    /// The returned error is what the current caller sees.
    fn abort(&mut self, err: Error) -> Error {
        let reason = err.to_string();
        if self.state != ConnectionState::Disconnected {
            tracing::warn!(error = %reason, state = %self.state, "connection failed");
        }
        self.framed = None;
        self.selected = None;
        self.pipeline.fail_all(&reason);
        self.transition(ConnectionState::Disconnected);
        match err {
            Error::Timeout(_) | Error::ConnectionLost(_) => err,
            other => Error::ConnectionLost(other.to_string()),
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "connection state");
            self.state = next;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.is_open() && self.framed.is_some() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!("connection is {}", self.state)))
        }
    }

    fn require_authenticated(&self, command: &str) -> Result<()> {
        if self.state.is_authenticated() {
            Ok(())
        } else {
            Err(self.wrong_state(command))
        }
    }

    fn require_selected(&self, command: &str) -> Result<()> {
        if self.state.is_selected() {
            Ok(())
        } else {
            Err(self.wrong_state(command))
        }
    }

    fn wrong_state(&self, command: &str) -> Error {
        Error::InvalidState(format!("{command} not allowed while {}", self.state))
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
pub(crate) mod tests {
    use tokio_test::io::{Builder, Mock};

    use super::*;

    pub(crate) fn config() -> Config {
        Config::builder("imap.example.com")
            .security(Security::None)
            .build()
    }

    pub(crate) async fn connect(mock: Mock) -> Connection<Mock> {
        Connection::from_stream(mock, config()).await.unwrap()
    }

    /// Collects events through a channel so the test can look at them while
    /// the connection owns the handler.
    pub(crate) fn collect(conn: &mut Connection<Mock>) -> tokio::sync::mpsc::UnboundedReceiver<MailboxEvent> {
        let (handler, rx) = crate::handler::ChannelHandler::new();
        conn.set_handler(handler);
        rx
    }

    #[tokio::test]
    async fn greeting_ok() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 IDLE LITERAL+] ready\r\n")
            .build();
        let conn = connect(mock).await;
        assert_eq!(conn.state(), ConnectionState::Greeted);
        assert!(conn.capabilities().has(&Capability::Idle));
        assert_eq!(conn.greeting(), "ready");
    }

    #[tokio::test]
    async fn greeting_preauth() {
        let mock = Builder::new().read(b"* PREAUTH welcome back\r\n").build();
        let conn = connect(mock).await;
        assert_eq!(conn.state(), ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn greeting_bye_is_connect_error() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Connection::from_stream(mock, config()).await.unwrap_err();
        assert!(matches!(err, Error::Connect(ref m) if m.contains("too many connections")));
    }

    #[tokio::test(start_paused = true)]
    async fn greeting_timeout_is_connect_error() {
        let mock = Builder::new().wait(Duration::from_secs(60)).build();
        let err = Connection::from_stream(mock, config()).await.unwrap_err();
        assert!(matches!(err, Error::Connect(_)));
    }

    #[tokio::test]
    async fn capability_negotiation() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN SASL-IR\r\nA0001 OK done\r\n")
            .build();
        let mut conn = connect(mock).await;
        let caps = conn.negotiate_capabilities().await.unwrap();
        assert!(caps.supports_auth("PLAIN"));
        assert!(caps.has(&Capability::SaslIr));
    }

    #[tokio::test]
    async fn raw_send_and_wait_pipelined() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1] hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .write(b"A0002 NOOP\r\n")
            .read(b"A0002 OK second\r\nA0001 OK first\r\n")
            .build();
        let mut conn = connect(mock).await;
        let a = conn.send(&Command::Noop).unwrap();
        let b = conn.send(&Command::Noop).unwrap();
        conn.flush().await.unwrap();
        assert_eq!(conn.wait(&b).await.unwrap().text, "second");
        assert_eq!(conn.wait(&a).await.unwrap().text, "first");
    }

    #[tokio::test]
    async fn no_is_command_error() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 NO [UNAVAILABLE] try later\r\n")
            .build();
        let mut conn = connect(mock).await;
        let err = conn.noop().await.unwrap_err();
        assert!(err.is_command());
        assert_eq!(err.response_code(), Some(&ResponseCode::Unavailable));
        assert_eq!(conn.state(), ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn unexpected_bye_is_fatal() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* BYE shutting down\r\n")
            .build();
        let mut conn = connect(mock).await;
        let mut events = collect(&mut conn);
        let err = conn.noop().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(events.recv().await, Some(MailboxEvent::Bye("shutting down".into())));
        assert!(matches!(conn.noop().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn malformed_data_is_fatal() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"garbage without structure\r\n")
            .build();
        let mut conn = connect(mock).await;
        assert!(matches!(conn.noop().await, Err(Error::ConnectionLost(_))));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn pending_commands_rejected_on_eof() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1] hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .write(b"A0002 NOOP\r\n")
            .build();
        let mut conn = connect(mock).await;
        let a = conn.send(&Command::Noop).unwrap();
        let b = conn.send(&Command::Noop).unwrap();
        assert!(matches!(conn.wait(&a).await, Err(Error::ConnectionLost(_))));
        assert!(matches!(conn.wait(&b).await, Err(Error::ConnectionLost(_))));
    }

    #[tokio::test]
    async fn logout_accepts_bye() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE see you\r\nA0001 OK done\r\n")
            .build();
        let mut conn = connect(mock).await;
        conn.logout().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::LoggedOut);
    }

    #[tokio::test]
    async fn alert_is_forwarded() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* OK [ALERT] disk almost full\r\nA0001 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        let mut events = collect(&mut conn);
        conn.noop().await.unwrap();
        assert_eq!(events.recv().await, Some(MailboxEvent::Alert("disk almost full".into())));
    }
}
