//! Mailbox-update events.
//!
//! Servers send EXISTS, EXPUNGE, FETCH and a few others whenever they like,
//! not only in reply to a command (RFC 3501 section 7). The connection
//! applies them to its selected-mailbox state and then hands them to the
//! installed [`EventHandler`].
//!
//! # Example
//!
//! ```
//! use mailtree_imap::handler::{EventHandler, MailboxEvent};
//!
//! #[derive(Default)]
//! struct NewMail {
//!     count: u32,
//! }
//!
//! impl EventHandler for NewMail {
//!     fn on_event(&mut self, event: MailboxEvent) {
//!         if let MailboxEvent::Exists(n) = event {
//!             self.count = n;
//!         }
//!     }
//! }
//! ```

use tokio::sync::mpsc;

use crate::types::{Flags, SeqNum, Uid};

/// A change to the selected mailbox or the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxEvent {
    /// The mailbox now holds this many messages.
    Exists(u32),
    /// Number of messages with `\Recent`.
    Recent(u32),
    /// A message was removed. Later sequence numbers have shifted down.
    Expunge {
        /// Position the message had.
        seq: SeqNum,
        /// UID of the removed message, if it was known.
        uid: Option<Uid>,
    },
    /// Another client changed a message's flags.
    FlagsChanged {
        /// The message.
        seq: SeqNum,
        /// Its UID, when the server sent it or the cache knows it.
        uid: Option<Uid>,
        /// The complete new flag set.
        flags: Flags,
    },
    /// `[ALERT]` text. RFC 3501 requires showing it to the user.
    Alert(String),
    /// The server is closing the connection.
    Bye(String),
}

/// Receiver of [`MailboxEvent`]s.
pub trait EventHandler: Send {
    /// Called once per event, in arrival order.
    fn on_event(&mut self, event: MailboxEvent);
}

/// A handler that logs events using tracing. Installed by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&mut self, event: MailboxEvent) {
        match event {
            MailboxEvent::Exists(count) => tracing::debug!(count, "EXISTS"),
            MailboxEvent::Recent(count) => tracing::debug!(count, "RECENT"),
            MailboxEvent::Expunge { seq, uid } => {
                tracing::debug!(seq = seq.get(), uid = ?uid.map(Uid::get), "EXPUNGE");
            }
            MailboxEvent::FlagsChanged { seq, flags, .. } => {
                tracing::debug!(seq = seq.get(), ?flags, "flags changed");
            }
            MailboxEvent::Alert(text) => tracing::warn!(text, "ALERT"),
            MailboxEvent::Bye(text) => tracing::info!(text, "BYE"),
        }
    }
}

/// A handler that collects events for later processing.
#[derive(Debug, Default, Clone)]
pub struct CollectingHandler {
    /// Collected events.
    pub events: Vec<MailboxEvent>,
}

impl CollectingHandler {
    /// Creates an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything collected so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Takes all collected events, leaving the handler empty.
    pub fn take(&mut self) -> Vec<MailboxEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventHandler for CollectingHandler {
    fn on_event(&mut self, event: MailboxEvent) {
        self.events.push(event);
    }
}

/// A handler that forwards events to a tokio channel, for consumers running
/// on another task.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<MailboxEvent>,
}

impl ChannelHandler {
    /// Creates a handler and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MailboxEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventHandler for ChannelHandler {
    fn on_event(&mut self, event: MailboxEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
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

    #[test]
    fn test_logging_handler() {
        let mut handler = LoggingHandler;
        handler.on_event(MailboxEvent::Exists(100));
        handler.on_event(MailboxEvent::Alert("important!".into()));
    }

    #[test]
    fn test_collecting_handler() {
        let mut handler = CollectingHandler::new();

        handler.on_event(MailboxEvent::Exists(50));
        handler.on_event(MailboxEvent::Recent(5));
        handler.on_event(MailboxEvent::Alert("Test alert".to_string()));

        assert_eq!(handler.events.len(), 3);
        assert_eq!(handler.events[0], MailboxEvent::Exists(50));
        assert_eq!(
            handler.events[2],
            MailboxEvent::Alert("Test alert".to_string())
        );

        let taken = handler.take();
        assert_eq!(taken.len(), 3);
        assert!(handler.events.is_empty());
    }

    #[test]
    fn test_collecting_handler_clear() {
        let mut handler = CollectingHandler::new();
        handler.on_event(MailboxEvent::Exists(10));
        handler.clear();
        assert!(handler.events.is_empty());
    }

    #[tokio::test]
    async fn test_channel_handler() {
        let (mut handler, mut rx) = ChannelHandler::new();
        handler.on_event(MailboxEvent::Bye("later".into()));
        assert_eq!(rx.recv().await, Some(MailboxEvent::Bye("later".into())));

        drop(rx);
        handler.on_event(MailboxEvent::Exists(1));
    }
}
