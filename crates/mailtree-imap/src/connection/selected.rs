//! State of the selected mailbox.
//!
//! Built from the SELECT/EXAMINE replies and then kept in step with every
//! EXISTS, EXPUNGE and FETCH the server sends, whichever command they arrive
//! with. The sequence-to-UID cache is sparse and keyed by sequence number:
//! only messages a FETCH reported have an entry, whatever EXISTS claims. An
//! EXPUNGE removes its entry and renumbers the ones above it.

use std::collections::BTreeMap;

use crate::handler::MailboxEvent;
use crate::parser::{FetchItem, UntaggedResponse};
use crate::pipeline::CommandResult;
use crate::types::{Flags, Mailbox, MailboxStatus, ResponseCode, SeqNum, Status, Uid};

#[derive(Debug, Clone, Default)]
struct Message {
    uid: Option<Uid>,
    flags: Option<Flags>,
}

/// The open mailbox and what is known about its messages.
#[derive(Debug, Clone)]
pub struct SelectedMailbox {
    mailbox: Mailbox,
    status: MailboxStatus,
    messages: BTreeMap<u32, Message>,
}

impl SelectedMailbox {
    pub(crate) fn new(mailbox: Mailbox, read_only: bool) -> Self {
        Self {
            mailbox,
            status: MailboxStatus {
                read_only,
                ..MailboxStatus::default()
            },
            messages: BTreeMap::new(),
        }
    }

    /// Builds the state from a successful SELECT or EXAMINE.
    pub(crate) fn from_completion(mailbox: Mailbox, read_only: bool, result: &CommandResult) -> Self {
        let mut selected = Self::new(mailbox, read_only);
        for response in &result.responses {
            selected.apply(response);
        }
        if let Some(code) = &result.code {
            selected.apply_code(code);
        }
        selected
    }

    /// Name of the selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Counters and codes reported since the mailbox was selected.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }

    /// Returns true if the mailbox was opened read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.status.read_only
    }

    /// Cached UID of a message, if a FETCH reported it.
    #[must_use]
    pub fn uid(&self, seq: SeqNum) -> Option<Uid> {
        self.message(seq).and_then(|m| m.uid)
    }

    /// Sequence number of a cached UID.
    #[must_use]
    pub fn seq_of(&self, uid: Uid) -> Option<SeqNum> {
        self.messages
            .iter()
            .find(|(_, m)| m.uid == Some(uid))
            .and_then(|(seq, _)| SeqNum::new(*seq))
    }

    /// Cached flags of a message.
    #[must_use]
    pub fn flags(&self, seq: SeqNum) -> Option<&Flags> {
        self.message(seq).and_then(|m| m.flags.as_ref())
    }

    fn message(&self, seq: SeqNum) -> Option<&Message> {
        self.messages.get(&seq.get())
    }

    /// Applies one untagged response and returns the event it amounts to.
    pub(crate) fn apply(&mut self, response: &UntaggedResponse) -> Option<MailboxEvent> {
        match response {
            UntaggedResponse::Exists(n) => {
                self.status.exists = *n;
                self.messages.retain(|seq, _| seq <= n);
                Some(MailboxEvent::Exists(*n))
            }
            UntaggedResponse::Recent(n) => {
                self.status.recent = *n;
                Some(MailboxEvent::Recent(*n))
            }
            UntaggedResponse::Expunge(seq) => {
                if seq.get() > self.status.exists {
                    tracing::warn!(seq = seq.get(), exists = self.status.exists, "EXPUNGE beyond mailbox size");
                }
                let uid = self.messages.remove(&seq.get()).and_then(|m| m.uid);
                let above = self.messages.split_off(&seq.get());
                self.messages
                    .extend(above.into_iter().map(|(n, message)| (n - 1, message)));
                self.status.exists = self.status.exists.saturating_sub(1);
                Some(MailboxEvent::Expunge { seq: *seq, uid })
            }
            UntaggedResponse::Fetch { seq, items } => self.apply_fetch(*seq, items),
            UntaggedResponse::Flags(flags) => {
                self.status.flags = flags.clone();
                None
            }
            UntaggedResponse::Condition {
                status: Status::Ok,
                code: Some(code),
                ..
            } => {
                self.apply_code(code);
                None
            }
            _ => None,
        }
    }

    fn apply_fetch(&mut self, seq: SeqNum, items: &[FetchItem]) -> Option<MailboxEvent> {
        // Servers may report a message before the EXISTS that covers it.
        self.status.exists = self.status.exists.max(seq.get());
        let message = self.messages.entry(seq.get()).or_default();

        let mut changed = None;
        for item in items {
            match item {
                FetchItem::Uid(uid) => message.uid = Some(*uid),
                FetchItem::Flags(flags) => {
                    message.flags = Some(flags.clone());
                    changed = Some(flags.clone());
                }
                _ => {}
            }
        }

        changed.map(|flags| MailboxEvent::FlagsChanged {
            seq,
            uid: message.uid,
            flags,
        })
    }

    fn apply_code(&mut self, code: &ResponseCode) {
        match code {
            ResponseCode::PermanentFlags(flags) => {
                self.status.permanent_flags = flags.iter().cloned().collect();
            }
            ResponseCode::UidNext(uid) => self.status.uid_next = Some(*uid),
            ResponseCode::UidValidity(v) => self.status.uid_validity = Some(*v),
            ResponseCode::Unseen(seq) => self.status.unseen = Some(*seq),
            ResponseCode::ReadOnly => self.status.read_only = true,
            ResponseCode::ReadWrite => self.status.read_only = false,
            _ => {}
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
    use crate::parser::{Response, ResponseParser};

    fn untagged(line: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(line).unwrap() {
            Response::Untagged(data) => data,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    fn seq(n: u32) -> SeqNum {
        SeqNum::new(n).unwrap()
    }

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn with_uids(uids: &[u32]) -> SelectedMailbox {
        let mut selected = SelectedMailbox::new(Mailbox::inbox(), false);
        selected.apply(&untagged(format!("* {} EXISTS\r\n", uids.len()).as_bytes()));
        for (i, u) in uids.iter().enumerate() {
            selected.apply(&untagged(format!("* {} FETCH (UID {u})\r\n", i + 1).as_bytes()));
        }
        selected
    }

    #[test]
    fn select_completion() {
        let result = CommandResult {
            status: Status::Ok,
            code: Some(ResponseCode::ReadOnly),
            text: "EXAMINE completed".into(),
            responses: vec![
                untagged(b"* 172 EXISTS\r\n"),
                untagged(b"* 1 RECENT\r\n"),
                untagged(b"* OK [UNSEEN 12] first unseen\r\n"),
                untagged(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n"),
                untagged(b"* OK [UIDNEXT 4392] next\r\n"),
                untagged(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n"),
                untagged(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] limited\r\n"),
            ],
        };
        let selected = SelectedMailbox::from_completion(Mailbox::inbox(), false, &result);
        let status = selected.status();
        assert_eq!(status.exists, 172);
        assert_eq!(status.recent, 1);
        assert_eq!(status.unseen, Some(seq(12)));
        assert_eq!(status.uid_validity.map(|v| v.get()), Some(3857529045));
        assert_eq!(status.uid_next, Some(uid(4392)));
        assert_eq!(status.flags.len(), 5);
        assert_eq!(status.permanent_flags.len(), 3);
        assert!(selected.is_read_only());
    }

    #[test]
    fn expunge_shifts_uid_cache() {
        let mut selected = with_uids(&[10, 20, 30, 40]);
        let event = selected.apply(&untagged(b"* 2 EXPUNGE\r\n"));
        assert_eq!(
            event,
            Some(MailboxEvent::Expunge {
                seq: seq(2),
                uid: Some(uid(20))
            })
        );
        assert_eq!(selected.status().exists, 3);
        assert_eq!(selected.uid(seq(2)), Some(uid(30)));
        assert_eq!(selected.uid(seq(3)), Some(uid(40)));
        assert_eq!(selected.seq_of(uid(40)), Some(seq(3)));
        assert_eq!(selected.seq_of(uid(20)), None);
    }

    #[test]
    fn repeated_expunge_of_same_seq() {
        let mut selected = with_uids(&[1, 2, 3]);
        selected.apply(&untagged(b"* 1 EXPUNGE\r\n"));
        selected.apply(&untagged(b"* 1 EXPUNGE\r\n"));
        assert_eq!(selected.uid(seq(1)), Some(uid(3)));
        assert_eq!(selected.status().exists, 1);
    }

    #[test]
    fn exists_grows_cache() {
        let mut selected = with_uids(&[5]);
        assert_eq!(selected.apply(&untagged(b"* 3 EXISTS\r\n")), Some(MailboxEvent::Exists(3)));
        assert_eq!(selected.uid(seq(1)), Some(uid(5)));
        assert_eq!(selected.uid(seq(3)), None);
    }

    #[test]
    fn huge_exists_allocates_nothing() {
        let mut selected = SelectedMailbox::new(Mailbox::inbox(), false);
        let event = selected.apply(&untagged(b"* 4000000000 EXISTS\r\n"));
        assert_eq!(event, Some(MailboxEvent::Exists(4_000_000_000)));
        assert_eq!(selected.status().exists, 4_000_000_000);
        assert!(selected.messages.is_empty());

        selected.apply(&untagged(b"* 3999999999 FETCH (UID 77)\r\n"));
        assert_eq!(selected.messages.len(), 1);
        assert_eq!(selected.seq_of(uid(77)), Some(seq(3_999_999_999)));
        selected.apply(&untagged(b"* 5 EXPUNGE\r\n"));
        assert_eq!(selected.uid(seq(3_999_999_998)), Some(uid(77)));
        assert_eq!(selected.status().exists, 3_999_999_999);
    }

    #[test]
    fn shrinking_exists_drops_cached_tail() {
        let mut selected = with_uids(&[1, 2, 3]);
        selected.apply(&untagged(b"* 1 EXISTS\r\n"));
        assert_eq!(selected.uid(seq(1)), Some(uid(1)));
        assert_eq!(selected.uid(seq(3)), None);
    }

    #[test]
    fn fetch_flags_event() {
        let mut selected = with_uids(&[7]);
        let event = selected.apply(&untagged(b"* 1 FETCH (FLAGS (\\Seen))\r\n"));
        let Some(MailboxEvent::FlagsChanged { seq: s, uid: u, flags }) = event else {
            panic!("expected flag change");
        };
        assert_eq!(s, seq(1));
        assert_eq!(u, Some(uid(7)));
        assert!(flags.is_seen());
        assert!(selected.flags(seq(1)).unwrap().is_seen());
    }

    #[test]
    fn fetch_without_flags_is_silent() {
        let mut selected = with_uids(&[7]);
        assert_eq!(selected.apply(&untagged(b"* 1 FETCH (UID 8)\r\n")), None);
        assert_eq!(selected.uid(seq(1)), Some(uid(8)));
    }
}
