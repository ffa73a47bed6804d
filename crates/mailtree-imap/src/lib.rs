//! # mailtree-imap
//!
//! An asynchronous IMAP client core (RFC 3501 / RFC 9051) with command
//! pipelining and a client-side folder tree.
//!
//! ## Features
//!
//! - **Compact sequence sets**: normalized range sets with a canonical
//!   `1:3,5,7:*` wire form
//! - **Streaming response decoder**: line and literal framing separated from
//!   network I/O
//! - **Command pipeline**: tagged commands in flight at once, ordered
//!   completion, synchronizing literals and continuation requests
//! - **Connection**: greeting, STARTTLS, LOGIN / AUTHENTICATE, mailbox and
//!   message commands, IDLE with a watchdog
//! - **Folder tree**: hierarchy inferred from LIST, namespaces, subscription
//!   and expansion state, guarded special mailboxes
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtree_imap::{Config, Connection, Ftree, IdleEvent, Security};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> mailtree_imap::Result<()> {
//!     let config = Config::builder("imap.example.com")
//!         .security(Security::Implicit)
//!         .build();
//!     let mut conn = Connection::connect(config).await?;
//!     conn.login("user@example.com", "password").await?;
//!
//!     let mut tree = Ftree::new();
//!     tree.populate_all(&mut conn).await?;
//!     for element in &tree {
//!         println!("{}", element.name());
//!     }
//!
//!     let status = conn.select("INBOX").await?;
//!     println!("Messages: {}", status.exists);
//!
//!     let mut idle = conn.idle().await?;
//!     if let IdleEvent::Exists(n) = idle.wait(Duration::from_secs(30)).await? {
//!         println!("New count: {n}");
//!     }
//!     idle.done().await?;
//!
//!     conn.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Disconnected ── connect ──→ Greeted ── login ──→ Authenticated ── select ──→ Selected
//!                                                        ↑                        │
//!                                                        └──── close/unselect ────┘
//! ```
//!
//! A fatal error in any state drops the transport and returns to
//! `Disconnected`.
//!
//! ## Modules
//!
//! - [`command`]: IMAP command types and wire encoding
//! - [`connection`]: the client connection and its transports
//! - [`ftree`]: client-side folder tree
//! - [`handler`]: callbacks for unsolicited mailbox updates
//! - [`parser`]: sans-I/O response decoder and parser
//! - [`pipeline`]: in-flight command bookkeeping
//! - [`types`]: core IMAP types (flags, mailboxes, sequence sets, etc.)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod ftree;
pub mod handler;
pub mod parser;
pub mod pipeline;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    Config, ConfigBuilder, Connection, ConnectionState, Fetched, FramedStream, IdleEvent,
    IdleHandle, ImapStream, PipelineMode, Security, SelectedMailbox, Step,
};
pub use error::{Error, Result};
pub use ftree::{Element, Ftree, MailboxBackend, SpecialUse};
pub use handler::{EventHandler, MailboxEvent};
pub use parser::{Response, ResponseDecoder, ResponseParser, UntaggedResponse};
pub use pipeline::{CommandHandle, CommandResult, Pipeline};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, Namespaces,
    ResponseCode, SeqNum, SequenceSet, Status, Tag, Uid, UidSet, UidValidity,
};

/// IMAP protocol revision the client speaks by default.
pub const IMAP_VERSION: &str = "IMAP4rev1";
