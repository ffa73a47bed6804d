//! IMAP IDLE (RFC 2177).
//!
//! While IDLE runs the connection is borrowed by an [`IdleHandle`], so no
//! other command can be issued until it ends. Servers drop clients that
//! stay idle for 30 minutes; the watchdog ends IDLE before that.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use super::{Connection, Step};
use crate::command::Command;
use crate::parser::{FetchItem, UntaggedResponse};
use crate::pipeline::{CommandHandle, Dispatch};
use crate::types::{Capability, Flags, ResponseCode, SeqNum};
use crate::{Error, Result};

/// Event received during IDLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleEvent {
    /// New message count.
    Exists(u32),
    /// New `\Recent` count.
    Recent(u32),
    /// A message was removed; later sequence numbers shift down.
    Expunge(SeqNum),
    /// Flags of a message changed.
    Fetch {
        /// The message.
        seq: SeqNum,
        /// Its complete flag set.
        flags: Flags,
    },
    /// `[ALERT]` text the user should see.
    Alert(String),
    /// Nothing arrived within the wait timeout.
    Timeout,
    /// The watchdog ended IDLE; issue it again to keep listening.
    Watchdog,
    /// The server completed IDLE on its own.
    Ended,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Enters IDLE.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] without writing anything if the server
    /// lacks the IDLE capability, [`Error::InvalidState`] before
    /// authentication, or the server's rejection. A completion that skips
    /// the continuation is fatal.
    pub async fn idle(&mut self) -> Result<IdleHandle<'_, S>> {
        self.require_authenticated("IDLE")?;
        if !self.capabilities.has(&Capability::Idle) {
            return Err(Error::Unsupported("IDLE".into()));
        }

        let handle = self.send(&Command::Idle)?;
        match self.next_step(&handle).await? {
            Step::Continuation(text) => {
                tracing::debug!(tag = %handle.tag(), text, "idling");
                let deadline = Instant::now() + self.config.idle_watchdog;
                Ok(IdleHandle {
                    conn: self,
                    handle,
                    deadline,
                    finished: false,
                })
            }
            Step::Completed(_) => {
                Err(self.abort(Error::Protocol("IDLE completed without continuation".into())))
            }
        }
    }
}

/// An active IDLE.
///
/// Dropping the handle without [`IdleHandle::done`] queues `DONE`; it is
/// written before the connection's next command.
pub struct IdleHandle<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    conn: &'a mut Connection<S>,
    handle: CommandHandle,
    deadline: Instant,
    finished: bool,
}

impl<S> std::fmt::Debug for IdleHandle<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleHandle")
            .field("tag", self.handle.tag())
            .field("deadline", &self.deadline)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<S> IdleHandle<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Waits for the next mailbox change.
    ///
    /// Returns [`IdleEvent::Timeout`] if `timeout` elapses first. When the
    /// watchdog fires, `DONE` is sent and [`IdleEvent::Watchdog`] returned;
    /// after that, and after [`IdleEvent::Ended`], every call returns
    /// `Ended`.
    ///
    /// # Errors
    ///
    /// Transport failures and unexpected BYE are fatal for the connection.
    pub async fn wait(&mut self, timeout: Duration) -> Result<IdleEvent> {
        if self.finished {
            return Ok(IdleEvent::Ended);
        }
        loop {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.expire().await;
            }

            let Some(response) = self.conn.receive(timeout.min(remaining)).await? else {
                if Instant::now() >= self.deadline {
                    return self.expire().await;
                }
                return Ok(IdleEvent::Timeout);
            };

            match self.conn.dispatch(response)? {
                Dispatch::Attributed(owner) if owner == self.handle => {
                    let data = self.conn.pipeline.take_responses(&self.handle);
                    if let Some(event) = data.into_iter().find_map(event_for) {
                        return Ok(event);
                    }
                }
                Dispatch::Unsolicited(data) => {
                    if let Some(event) = event_for(data) {
                        return Ok(event);
                    }
                }
                Dispatch::Completed(owner) if owner == self.handle => {
                    self.finished = true;
                    tracing::debug!(tag = %self.handle.tag(), "server ended IDLE");
                    return match self.conn.pipeline.take_result(&self.handle) {
                        Some(Err(err)) => Err(err),
                        _ => Ok(IdleEvent::Ended),
                    };
                }
                _ => {}
            }
        }
    }

    /// Sends `DONE` and waits for IDLE to complete.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection or a fatal error.
    pub async fn done(mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finish().await
    }

    async fn expire(&mut self) -> Result<IdleEvent> {
        tracing::warn!(
            tag = %self.handle.tag(),
            after = ?self.conn.config.idle_watchdog,
            "IDLE watchdog expired, sending DONE"
        );
        self.finish().await?;
        Ok(IdleEvent::Watchdog)
    }

    async fn finish(&mut self) -> Result<()> {
        self.finished = true;
        self.conn.continue_with(&self.handle, b"DONE").await?;
        self.conn.wait(&self.handle).await.map(drop)
    }
}

impl<S> Drop for IdleHandle<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn drop(&mut self) {
        if self.finished || !self.conn.state.is_open() {
            return;
        }
        if self.conn.pipeline.continue_with(&self.handle, b"DONE").is_ok() {
            self.conn.pipeline.detach(&self.handle);
        }
    }
}

fn event_for(data: UntaggedResponse) -> Option<IdleEvent> {
    match data {
        UntaggedResponse::Exists(n) => Some(IdleEvent::Exists(n)),
        UntaggedResponse::Recent(n) => Some(IdleEvent::Recent(n)),
        UntaggedResponse::Expunge(seq) => Some(IdleEvent::Expunge(seq)),
        UntaggedResponse::Fetch { seq, items } => items.into_iter().find_map(|item| match item {
            FetchItem::Flags(flags) => Some(IdleEvent::Fetch { seq, flags }),
            _ => None,
        }),
        UntaggedResponse::Condition {
            code: Some(ResponseCode::Alert),
            text,
            ..
        } => Some(IdleEvent::Alert(text)),
        _ => None,
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
    use tokio_test::io::{Builder, Mock};

    use super::super::tests::connect;
    use super::super::{Config, ConnectionState, Security};
    use super::*;

    const GREETING: &[u8] = b"* PREAUTH [CAPABILITY IMAP4rev1 IDLE] hi\r\n";

    async fn with_watchdog(mock: Mock, watchdog: Duration) -> Connection<Mock> {
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .idle_watchdog(watchdog)
            .build();
        Connection::from_stream(mock, config).await.unwrap()
    }

    #[tokio::test]
    async fn idle_without_capability_sends_nothing() {
        let mock = Builder::new().read(b"* PREAUTH [CAPABILITY IMAP4rev1] hi\r\n").build();
        let mut conn = connect(mock).await;
        let err = conn.idle().await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(ref c) if c == "IDLE"));
        assert_eq!(conn.state(), ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn idle_needs_authentication() {
        let mock = Builder::new().read(b"* OK [CAPABILITY IMAP4rev1 IDLE] hi\r\n").build();
        let mut conn = connect(mock).await;
        assert!(matches!(conn.idle().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn events_then_done() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\nA0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 IDLE\r\n")
            .read(b"+ idling\r\n")
            .read(b"* 4 EXISTS\r\n")
            .read(b"* 2 FETCH (FLAGS (\\Seen))\r\n")
            .read(b"* OK [ALERT] maintenance at noon\r\n")
            .write(b"DONE\r\n")
            .read(b"A0002 OK IDLE terminated\r\n")
            .build();
        let mut conn = connect(mock).await;
        conn.select("INBOX").await.unwrap();

        let mut idle = conn.idle().await.unwrap();
        let wait = Duration::from_secs(60);
        assert_eq!(idle.wait(wait).await.unwrap(), IdleEvent::Exists(4));
        let IdleEvent::Fetch { seq, flags } = idle.wait(wait).await.unwrap() else {
            panic!("expected flag update");
        };
        assert_eq!(seq.get(), 2);
        assert!(flags.is_seen());
        assert_eq!(
            idle.wait(wait).await.unwrap(),
            IdleEvent::Alert("maintenance at noon".into())
        );
        idle.done().await.unwrap();

        assert_eq!(conn.selected().unwrap().status().exists, 4);
        assert_eq!(conn.state(), ConnectionState::Selected);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 IDLE\r\n")
            .read(b"+ idling\r\n")
            .write(b"DONE\r\n")
            .read(b"A0001 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        let mut idle = conn.idle().await.unwrap();
        assert_eq!(idle.wait(Duration::from_secs(5)).await.unwrap(), IdleEvent::Timeout);
        idle.done().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_sends_done() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 IDLE\r\n")
            .read(b"+ idling\r\n")
            .write(b"DONE\r\n")
            .read(b"A0001 OK IDLE terminated\r\n")
            .build();
        let mut conn = with_watchdog(mock, Duration::from_secs(10 * 60)).await;
        let mut idle = conn.idle().await.unwrap();

        let event = idle.wait(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(event, IdleEvent::Watchdog);
        assert_eq!(idle.wait(Duration::from_secs(1)).await.unwrap(), IdleEvent::Ended);
        idle.done().await.unwrap();
    }

    #[tokio::test]
    async fn server_ends_idle() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 IDLE\r\n")
            .read(b"+ idling\r\n")
            .read(b"A0001 OK done early\r\n")
            .build();
        let mut conn = connect(mock).await;
        let mut idle = conn.idle().await.unwrap();
        assert_eq!(idle.wait(Duration::from_secs(60)).await.unwrap(), IdleEvent::Ended);
        idle.done().await.unwrap();
    }

    #[tokio::test]
    async fn idle_completed_without_continuation_is_fatal() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 IDLE\r\n")
            .read(b"A0001 OK nothing to wait for\r\n")
            .build();
        let mut conn = connect(mock).await;
        let err = conn.idle().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)), "got {err:?}");
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(matches!(conn.noop().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn dropped_handle_sends_done_before_next_command() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 IDLE\r\n")
            .read(b"+ idling\r\n")
            .write(b"DONE\r\n")
            .read(b"A0001 OK IDLE terminated\r\n")
            .write(b"A0002 NOOP\r\n")
            .read(b"A0002 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        drop(conn.idle().await.unwrap());
        conn.noop().await.unwrap();
    }

    #[tokio::test]
    async fn bye_during_idle_is_fatal() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 IDLE\r\n")
            .read(b"+ idling\r\n")
            .read(b"* BYE idle too long\r\n")
            .build();
        let mut conn = connect(mock).await;
        let mut idle = conn.idle().await.unwrap();
        assert!(matches!(
            idle.wait(Duration::from_secs(60)).await,
            Err(Error::ConnectionLost(_))
        ));
        drop(idle);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
