//! Core IMAP types.
//!
//! Fundamental values shared by the parser, the command encoder and the
//! connection, following RFC 3501 (`IMAP4rev1`) and RFC 9051 (`IMAP4rev2`).

mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod namespace;
mod response_code;
mod sequence;

pub use capability::{Capabilities, Capability, LiteralMode, Status};
pub use flags::{Flag, Flags};
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{ListResponse, Mailbox, MailboxAttribute, MailboxStatus};
pub use namespace::{Namespace, NamespaceKind, Namespaces};
pub use response_code::ResponseCode;
pub use sequence::{IdSet, SequenceSet, SetItem, UidSet};
