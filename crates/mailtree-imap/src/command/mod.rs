//! IMAP commands and their wire encoding.
//!
//! [`Command::encode`] produces one or more segments. Every segment but the
//! last ends in a synchronizing literal announcement, so the sender has to
//! wait for a `+` continuation before writing the next one.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{Flag, LiteralMode, Mailbox, Tag, UidSet};
use crate::{Error, Result};

pub use serialize::Encoder;
pub use tag_generator::TagGenerator;
pub use types::{
    FetchAttribute, FetchItems, MessageSet, SearchCriteria, StatusAttribute, StoreAction,
};

use serialize::{write_fetch_items, write_search_criteria, write_store_action};

/// IMAP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// `CAPABILITY`
    Capability,
    /// `NOOP`
    Noop,
    /// `LOGOUT`
    Logout,

    // Not authenticated
    /// `STARTTLS`
    StartTls,
    /// `LOGIN`. The password never shows up in `Debug` output.
    Login {
        /// Login name.
        username: String,
        /// Plain-text password.
        password: String,
    },
    /// AUTHENTICATE with an optional SASL-IR initial response, already
    /// base64-encoded (`=` for an empty one).
    Authenticate {
        /// SASL mechanism name, e.g. `PLAIN`.
        mechanism: String,
        /// Initial response sent with the command (SASL-IR).
        initial_response: Option<String>,
    },

    // Authenticated
    /// `ENABLE` (RFC 5161).
    Enable {
        /// Capability names to enable.
        capabilities: Vec<String>,
    },
    /// `SELECT`
    Select {
        /// Mailbox to open read-write.
        mailbox: Mailbox,
    },
    /// `EXAMINE`
    Examine {
        /// Mailbox to open read-only.
        mailbox: Mailbox,
    },
    /// `CREATE`
    Create {
        /// New mailbox.
        mailbox: Mailbox,
    },
    /// `DELETE`
    Delete {
        /// Mailbox to remove.
        mailbox: Mailbox,
    },
    /// `RENAME`
    Rename {
        /// Current name.
        from: Mailbox,
        /// New name.
        to: Mailbox,
    },
    /// `SUBSCRIBE`
    Subscribe {
        /// Mailbox to add to the subscription list.
        mailbox: Mailbox,
    },
    /// `UNSUBSCRIBE`
    Unsubscribe {
        /// Mailbox to drop from the subscription list.
        mailbox: Mailbox,
    },
    /// `LIST`
    List {
        /// Reference name, usually empty.
        reference: String,
        /// Pattern with `*` and `%` wildcards.
        pattern: String,
    },
    /// `LSUB`
    Lsub {
        /// Reference name, usually empty.
        reference: String,
        /// Pattern with `*` and `%` wildcards.
        pattern: String,
    },
    /// `NAMESPACE` (RFC 2342).
    Namespace,
    /// `STATUS`
    Status {
        /// Mailbox to query. Must not be the selected one.
        mailbox: Mailbox,
        /// Counters to return.
        items: Vec<StatusAttribute>,
    },
    /// APPEND. The message always travels as a literal.
    Append {
        /// Target mailbox.
        mailbox: Mailbox,
        /// Flags set on the new message.
        flags: Vec<Flag>,
        /// Internal date in IMAP `date-time` form.
        date: Option<String>,
        /// Raw RFC 5322 message.
        message: Vec<u8>,
    },

    // Selected
    /// `CLOSE`, which also expunges.
    Close,
    /// `UNSELECT` (RFC 3691).
    Unselect,
    /// `EXPUNGE`
    Expunge,
    /// UID EXPUNGE (UIDPLUS).
    UidExpunge {
        /// Messages to expunge.
        uids: UidSet,
    },
    /// `SEARCH` or `UID SEARCH`.
    Search {
        /// What to match.
        criteria: SearchCriteria,
        /// Return UIDs instead of sequence numbers.
        uid: bool,
    },
    /// `FETCH`, or `UID FETCH` for a UID set.
    Fetch {
        /// Messages to fetch.
        set: MessageSet,
        /// Data items to return.
        items: FetchItems,
    },
    /// `STORE`, or `UID STORE` for a UID set.
    Store {
        /// Messages to change.
        set: MessageSet,
        /// How the flags change.
        action: StoreAction,
        /// Use `.SILENT`, so the server does not echo the new flags.
        silent: bool,
    },
    /// `COPY`, or `UID COPY` for a UID set.
    Copy {
        /// Messages to copy.
        set: MessageSet,
        /// Target mailbox.
        mailbox: Mailbox,
    },
    /// `IDLE` (RFC 2177).
    Idle,
}

impl Command {
    /// The command verb, with the `UID` prefix where it applies.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Enable { .. } => "ENABLE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Namespace => "NAMESPACE",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { uid: false, .. } => "SEARCH",
            Self::Search { uid: true, .. } => "UID SEARCH",
            Self::Fetch { set, .. } if set.is_uid() => "UID FETCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { set, .. } if set.is_uid() => "UID STORE",
            Self::Store { .. } => "STORE",
            Self::Copy { set, .. } if set.is_uid() => "UID COPY",
            Self::Copy { .. } => "COPY",
            Self::Idle => "IDLE",
        }
    }

    /// Returns true if the arguments hold credentials.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Authenticate { .. })
    }

    /// Returns false for commands that must be the only command in flight.
    ///
    /// These change the connection or selected-mailbox state, change the
    /// mailbox hierarchy, or hold a conversation through continuations.
    #[must_use]
    pub const fn is_pipelineable(&self) -> bool {
        !matches!(
            self,
            Self::StartTls
                | Self::Login { .. }
                | Self::Authenticate { .. }
                | Self::Logout
                | Self::Enable { .. }
                | Self::Select { .. }
                | Self::Examine { .. }
                | Self::Create { .. }
                | Self::Delete { .. }
                | Self::Rename { .. }
                | Self::Subscribe { .. }
                | Self::Unsubscribe { .. }
                | Self::Append { .. }
                | Self::Close
                | Self::Unselect
                | Self::Expunge
                | Self::UidExpunge { .. }
                | Self::Idle
        )
    }

    /// Returns true if the server answers with `+` and waits for data the
    /// caller supplies, rather than for a literal the encoder already holds.
    #[must_use]
    pub const fn expects_continuation(&self) -> bool {
        matches!(self, Self::Authenticate { .. } | Self::Idle)
    }

    /// Checks arguments that would encode to a malformed command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty message set, UID set
    /// or search group.
    pub fn validate(&self) -> Result<()> {
        let empty = match self {
            Self::Fetch { set, .. } | Self::Store { set, .. } | Self::Copy { set, .. } => set.is_empty(),
            Self::UidExpunge { uids } => uids.is_empty(),
            Self::Search { criteria, .. } => criteria.has_empty_key(),
            _ => false,
        };
        if empty {
            return Err(Error::InvalidArgument(format!("{} with an empty set", self.name())));
        }
        Ok(())
    }

    /// Encodes the command under `tag`.
    ///
    /// Strings longer than `literal_threshold` bytes are sent as literals;
    /// `mode` decides which literals may skip the continuation round trip.
    #[must_use]
    pub fn encode(&self, tag: &Tag, mode: LiteralMode, literal_threshold: usize) -> Vec<Vec<u8>> {
        let mut enc = Encoder::new(mode, literal_threshold);
        enc.raw(tag.as_str()).sp();
        self.write(&mut enc);
        enc.finish()
    }

    fn write(&self, enc: &mut Encoder) {
        enc.raw(self.name());
        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Namespace
            | Self::Close
            | Self::Unselect
            | Self::Expunge
            | Self::Idle => {}

            Self::Login { username, password } => {
                enc.sp().astring(username).sp().astring(password);
            }
            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                enc.sp().raw(mechanism);
                if let Some(ir) = initial_response {
                    enc.sp().raw(if ir.is_empty() { "=" } else { ir });
                }
            }
            Self::Enable { capabilities } => {
                for cap in capabilities {
                    enc.sp().raw(cap);
                }
            }
            Self::Select { mailbox }
            | Self::Examine { mailbox }
            | Self::Create { mailbox }
            | Self::Delete { mailbox }
            | Self::Subscribe { mailbox }
            | Self::Unsubscribe { mailbox } => {
                enc.sp().astring(mailbox.as_str());
            }
            Self::Rename { from, to } => {
                enc.sp().astring(from.as_str()).sp().astring(to.as_str());
            }
            Self::List { reference, pattern } | Self::Lsub { reference, pattern } => {
                enc.sp().astring(reference).sp();
                if !pattern.is_empty() && pattern.bytes().all(is_list_char) {
                    enc.raw(pattern);
                } else {
                    enc.string(pattern.as_bytes());
                }
            }
            Self::Status { mailbox, items } => {
                enc.sp().astring(mailbox.as_str()).raw(" (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        enc.sp();
                    }
                    enc.raw(item.as_str());
                }
                enc.raw(")");
            }
            Self::Append {
                mailbox,
                flags,
                date,
                message,
            } => {
                enc.sp().astring(mailbox.as_str());
                if !flags.is_empty() {
                    enc.sp().flag_list(flags);
                }
                if let Some(date) = date {
                    enc.sp().string(date.as_bytes());
                }
                enc.sp().literal(message);
            }
            Self::UidExpunge { uids } => {
                enc.sp().raw(uids.serialize());
            }
            Self::Search { criteria, .. } => {
                if criteria.needs_utf8() {
                    enc.raw(" CHARSET UTF-8");
                }
                enc.sp();
                write_search_criteria(enc, criteria);
            }
            Self::Fetch { set, items } => {
                enc.sp().raw(set.serialize()).sp();
                write_fetch_items(enc, items);
            }
            Self::Store {
                set,
                action,
                silent,
            } => {
                enc.sp().raw(set.serialize()).sp();
                write_store_action(enc, action, *silent);
            }
            Self::Copy { set, mailbox } => {
                enc.sp().raw(set.serialize()).sp().astring(mailbox.as_str());
            }
        }
    }

    /// One-line rendering for logs. Credentials are replaced.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Login { username, .. } => format!("LOGIN {username} <redacted>"),
            Self::Authenticate { mechanism, .. } => format!("AUTHENTICATE {mechanism} <redacted>"),
            Self::Append {
                mailbox, message, ..
            } => format!("APPEND {mailbox} ({} bytes)", message.len()),
            _ => {
                let mut enc = Encoder::new(LiteralMode::Plus, usize::MAX);
                self.write(&mut enc);
                let line = enc.finish().concat();
                String::from_utf8_lossy(&line).trim_end().to_string()
            }
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Bytes allowed unquoted in a LIST pattern: astring chars plus wildcards.
const fn is_list_char(b: u8) -> bool {
    b > 0x20 && b < 0x7f && !matches!(b, b'(' | b')' | b'{' | b'"' | b'\\')
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
    use crate::types::SequenceSet;

    fn line(cmd: &Command) -> Vec<u8> {
        let segments = cmd.encode(&Tag::new("A001").unwrap(), LiteralMode::Synchronizing, 1024);
        assert_eq!(segments.len(), 1, "unexpected literal in {cmd:?}");
        segments.concat()
    }

    #[test]
    fn pipelining_classes() {
        assert!(Command::Noop.is_pipelineable());
        assert!(!Command::Select { mailbox: Mailbox::inbox() }.is_pipelineable());
        assert!(!Command::Idle.is_pipelineable());
        assert!(Command::Idle.expects_continuation());
        assert!(!Command::Noop.expects_continuation());
    }

    #[test]
    fn exclusive_commands() {
        let mailbox = || Mailbox::new("Work");
        let set = || MessageSet::Seq(SequenceSet::single(1).unwrap());
        let exclusive = [
            Command::StartTls,
            Command::Login { username: "u".into(), password: "p".into() },
            Command::Authenticate { mechanism: "PLAIN".into(), initial_response: None },
            Command::Logout,
            Command::Enable { capabilities: vec!["UTF8=ACCEPT".into()] },
            Command::Select { mailbox: mailbox() },
            Command::Examine { mailbox: mailbox() },
            Command::Create { mailbox: mailbox() },
            Command::Delete { mailbox: mailbox() },
            Command::Rename { from: mailbox(), to: Mailbox::new("Old") },
            Command::Subscribe { mailbox: mailbox() },
            Command::Unsubscribe { mailbox: mailbox() },
            Command::Append { mailbox: mailbox(), flags: vec![], date: None, message: b"x".to_vec() },
            Command::Close,
            Command::Unselect,
            Command::Expunge,
            Command::UidExpunge { uids: UidSet::parse("1").unwrap() },
            Command::Idle,
        ];
        for cmd in &exclusive {
            assert!(!cmd.is_pipelineable(), "{} shares the wire", cmd.name());
        }

        let shared = [
            Command::Capability,
            Command::Noop,
            Command::Namespace,
            Command::List { reference: String::new(), pattern: "*".into() },
            Command::Lsub { reference: String::new(), pattern: "*".into() },
            Command::Status { mailbox: mailbox(), items: vec![StatusAttribute::Messages] },
            Command::Search { criteria: SearchCriteria::All, uid: false },
            Command::Fetch { set: set(), items: FetchItems::Fast },
            Command::Store { set: set(), action: StoreAction::Add(vec![Flag::Seen]), silent: true },
            Command::Copy { set: set(), mailbox: mailbox() },
        ];
        for cmd in &shared {
            assert!(cmd.is_pipelineable(), "{} is written alone", cmd.name());
        }
    }

    #[test]
    fn empty_sets_are_rejected() {
        let fetch = Command::Fetch {
            set: SequenceSet::empty().into(),
            items: FetchItems::Fast,
        };
        assert!(matches!(fetch.validate(), Err(Error::InvalidArgument(ref m)) if m == "FETCH with an empty set"));
        let store = Command::Store {
            set: UidSet::empty().into(),
            action: StoreAction::Add(vec![Flag::Deleted]),
            silent: false,
        };
        assert!(matches!(store.validate(), Err(Error::InvalidArgument(ref m)) if m == "UID STORE with an empty set"));
        let search = Command::Search {
            criteria: SearchCriteria::Not(Box::new(SearchCriteria::Sequence(SequenceSet::empty()))),
            uid: false,
        };
        assert!(search.validate().is_err());
        assert!(Command::UidExpunge { uids: UidSet::empty() }.validate().is_err());

        let fine = Command::Fetch {
            set: SequenceSet::all().into(),
            items: FetchItems::Fast,
        };
        assert!(fine.validate().is_ok());
        assert!(Command::Noop.validate().is_ok());
    }

    #[test]
    fn simple_commands() {
        assert_eq!(line(&Command::Capability), b"A001 CAPABILITY\r\n");
        assert_eq!(line(&Command::Unselect), b"A001 UNSELECT\r\n");
        assert_eq!(line(&Command::Idle), b"A001 IDLE\r\n");
    }

    #[test]
    fn login_quoting() {
        let cmd = Command::Login {
            username: "user@example.com".into(),
            password: "pass word".into(),
        };
        assert_eq!(line(&cmd), b"A001 LOGIN user@example.com \"pass word\"\r\n");
    }

    #[test]
    fn login_is_redacted() {
        let cmd = Command::Login {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{cmd:?}").contains("hunter2"));
        let auth = Command::Authenticate {
            mechanism: "PLAIN".into(),
            initial_response: Some("AGFsaWNlAGh1bnRlcjI=".into()),
        };
        assert_eq!(auth.describe(), "AUTHENTICATE PLAIN <redacted>");
        assert!(auth.is_sensitive());
    }

    #[test]
    fn authenticate_initial_response() {
        let cmd = Command::Authenticate {
            mechanism: "PLAIN".into(),
            initial_response: Some(String::new()),
        };
        assert_eq!(line(&cmd), b"A001 AUTHENTICATE PLAIN =\r\n");
    }

    #[test]
    fn list_patterns() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".into(),
        };
        assert_eq!(line(&cmd), b"A001 LIST \"\" *\r\n");
        let cmd = Command::Lsub {
            reference: "Work/".into(),
            pattern: "Old Stuff/%".into(),
        };
        assert_eq!(line(&cmd), b"A001 LSUB Work/ \"Old Stuff/%\"\r\n");
    }

    #[test]
    fn uid_prefix_follows_set_type() {
        let seq = Command::Fetch {
            set: SequenceSet::range(1, 10).unwrap().into(),
            items: FetchItems::Items(vec![FetchAttribute::Flags, FetchAttribute::Uid]),
        };
        assert_eq!(line(&seq), b"A001 FETCH 1:10 (FLAGS UID)\r\n");

        let uid = Command::Fetch {
            set: UidSet::from_start(4).unwrap().into(),
            items: FetchItems::Items(vec![FetchAttribute::Body {
                section: Some("HEADER".into()),
                peek: true,
                partial: None,
            }]),
        };
        assert_eq!(line(&uid), b"A001 UID FETCH 4:* BODY.PEEK[HEADER]\r\n");

        let copy = Command::Copy {
            set: UidSet::single(7).unwrap().into(),
            mailbox: Mailbox::new("Archive"),
        };
        assert_eq!(line(&copy), b"A001 UID COPY 7 Archive\r\n");
    }

    #[test]
    fn store_and_status() {
        let store = Command::Store {
            set: SequenceSet::single(1).unwrap().into(),
            action: StoreAction::Add(vec![Flag::Seen]),
            silent: true,
        };
        assert_eq!(line(&store), b"A001 STORE 1 +FLAGS.SILENT (\\Seen)\r\n");

        let status = Command::Status {
            mailbox: Mailbox::inbox(),
            items: vec![StatusAttribute::Messages, StatusAttribute::UidNext],
        };
        assert_eq!(line(&status), b"A001 STATUS INBOX (MESSAGES UIDNEXT)\r\n");
    }

    #[test]
    fn search_charset() {
        let ascii = Command::Search {
            criteria: SearchCriteria::Unseen,
            uid: true,
        };
        assert_eq!(line(&ascii), b"A001 UID SEARCH UNSEEN\r\n");

        let utf8 = Command::Search {
            criteria: SearchCriteria::Subject("Grüße".into()),
            uid: false,
        };
        let segments = utf8.encode(&Tag::new("A002").unwrap(), LiteralMode::Plus, 1024);
        assert_eq!(
            segments.concat(),
            "A002 SEARCH CHARSET UTF-8 SUBJECT {7+}\r\nGrüße\r\n".as_bytes()
        );
    }

    #[test]
    fn append_splits_at_message_literal() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("Sent"),
            flags: vec![Flag::Seen],
            date: None,
            message: b"Subject: hi\r\n\r\nbody".to_vec(),
        };
        let segments = cmd.encode(&Tag::new("A003").unwrap(), LiteralMode::Synchronizing, 1024);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], b"A003 APPEND Sent (\\Seen) {19}\r\n");
        assert_eq!(segments[1], b"Subject: hi\r\n\r\nbody\r\n");
        assert_eq!(cmd.describe(), "APPEND Sent (19 bytes)");

        let plus = cmd.encode(&Tag::new("A004").unwrap(), LiteralMode::Plus, 1024);
        assert_eq!(plus.len(), 1);
    }

    #[test]
    fn mailbox_with_newline_becomes_literal() {
        let cmd = Command::Create {
            mailbox: Mailbox::new("odd\nname"),
        };
        let segments = cmd.encode(&Tag::new("A005").unwrap(), LiteralMode::Synchronizing, 1024);
        assert_eq!(segments, vec![b"A005 CREATE {8}\r\n".to_vec(), b"odd\nname\r\n".to_vec()]);
    }
}
