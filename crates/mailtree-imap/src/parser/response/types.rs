//! Response data types.

use crate::types::{
    Capability, Flags, ListResponse, Mailbox, Namespaces, ResponseCode, SeqNum, Status, Uid,
    UidValidity,
};

/// Generic parenthesized value, used where the client does not interpret
/// the structure (BODYSTRUCTURE, extension FETCH items).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `NIL`
    Nil,
    /// Number.
    Number(u64),
    /// Atom, verbatim.
    Atom(String),
    /// Quoted string.
    String(String),
    /// Literal bytes.
    Literal(Vec<u8>),
    /// Parenthesized list.
    List(Vec<Self>),
}

impl Value {
    /// Returns the string content of a string, literal, or atom.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Atom(s) | Self::String(s) => Some(s),
            Self::Literal(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Returns the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// One item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// FLAGS
    Flags(Flags),
    /// UID
    Uid(Uid),
    /// INTERNALDATE, verbatim.
    InternalDate(String),
    /// RFC822.SIZE
    Rfc822Size(u32),
    /// ENVELOPE
    Envelope(Box<Envelope>),
    /// `BODY[section]<origin>`. `RFC822`, `RFC822.HEADER` and `RFC822.TEXT`
    /// map to sections `""`, `"HEADER"` and `"TEXT"`.
    Body {
        /// Text between the brackets, empty for the whole message.
        section: String,
        /// Partial fetch origin.
        origin: Option<u32>,
        /// Content, `None` for `NIL`.
        data: Option<Vec<u8>>,
    },
    /// BODYSTRUCTURE or BODY without a section.
    BodyStructure(Value),
    /// MODSEQ (CONDSTORE).
    ModSeq(u64),
    /// Any other item.
    Other {
        /// Item name, including any section.
        name: String,
        /// Item value.
        value: Value,
    },
}

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Envelope address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route.
    pub adl: Option<String>,
    /// Local part, or group name for group syntax.
    pub mailbox: Option<String>,
    /// Domain, `None` for group markers.
    pub host: Option<String>,
}

impl Address {
    /// Returns `mailbox@host` when both are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// STATUS response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusItem {
    /// MESSAGES
    Messages(u32),
    /// RECENT
    Recent(u32),
    /// UIDNEXT
    UidNext(Uid),
    /// UIDVALIDITY
    UidValidity(UidValidity),
    /// UNSEEN
    Unseen(u32),
    /// HIGHESTMODSEQ
    HighestModSeq(u64),
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `OK`, `NO`, `BAD`, `PREAUTH` or `BYE`.
    Condition {
        /// Status keyword.
        status: Status,
        /// Response code, if any.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// CAPABILITY
    Capability(Vec<Capability>),
    /// ENABLED
    Enabled(Vec<Capability>),
    /// LIST
    List(ListResponse),
    /// LSUB
    Lsub(ListResponse),
    /// NAMESPACE
    Namespace(Namespaces),
    /// FLAGS
    Flags(Flags),
    /// SEARCH; sequence numbers or UIDs depending on the command.
    Search(Vec<u32>),
    /// STATUS
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Reported items.
        items: Vec<StatusItem>,
    },
    /// `n EXISTS`
    Exists(u32),
    /// `n RECENT`
    Recent(u32),
    /// `n EXPUNGE`
    Expunge(SeqNum),
    /// `n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Items returned.
        items: Vec<FetchItem>,
    },
    /// Extension data the client does not interpret.
    Other {
        /// Keyword (or `"<n> <keyword>"` for message data).
        keyword: String,
        /// Rest of the line, verbatim.
        text: String,
    },
}

impl UntaggedResponse {
    /// Returns true for an untagged BYE.
    #[must_use]
    pub const fn is_bye(&self) -> bool {
        matches!(
            self,
            Self::Condition {
                status: Status::Bye,
                ..
            }
        )
    }

    /// Returns the FETCH item list for this sequence number, if any.
    #[must_use]
    pub fn fetch_items(&self) -> Option<(SeqNum, &[FetchItem])> {
        match self {
            Self::Fetch { seq, items } => Some((*seq, items)),
            _ => None,
        }
    }
}
