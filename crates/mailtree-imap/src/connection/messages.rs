//! Message commands on the selected mailbox.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Connection;
use crate::command::{Command, FetchItems, MessageSet, SearchCriteria, StoreAction};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::pipeline::CommandResult;
use crate::types::{Capability, Flags, Mailbox, SeqNum, SequenceSet, Uid, UidSet};
use crate::{Error, Result};

/// One message's FETCH data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Sequence number at the time the data arrived.
    pub seq: SeqNum,
    /// UID from the response, or from the connection's cache.
    pub uid: Option<Uid>,
    /// Every item the server returned for the message.
    pub items: Vec<FetchItem>,
}

impl Fetched {
    /// FLAGS item, if fetched.
    #[must_use]
    pub fn flags(&self) -> Option<&Flags> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Flags(flags) => Some(flags),
            _ => None,
        })
    }

    /// Content of a `BODY[section]` item.
    #[must_use]
    pub fn body(&self, section: &str) -> Option<&[u8]> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Body {
                section: s,
                data: Some(data),
                ..
            } if s.eq_ignore_ascii_case(section) => Some(data.as_slice()),
            _ => None,
        })
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Fetches data by sequence number.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn fetch(&mut self, set: &SequenceSet, items: FetchItems) -> Result<Vec<Fetched>> {
        self.fetch_set(set.clone().into(), items).await
    }

    /// Fetches data by UID.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn uid_fetch(&mut self, set: &UidSet, items: FetchItems) -> Result<Vec<Fetched>> {
        self.fetch_set(set.clone().into(), items).await
    }

    async fn fetch_set(&mut self, set: MessageSet, items: FetchItems) -> Result<Vec<Fetched>> {
        self.require_selected("FETCH")?;
        let result = self.run(&Command::Fetch { set, items }).await?;
        Ok(self.collect_fetched(result))
    }

    /// Changes flags by sequence number. Returns the new flags the server
    /// reported, nothing when `silent`.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn store(
        &mut self,
        set: &SequenceSet,
        action: StoreAction,
        silent: bool,
    ) -> Result<Vec<Fetched>> {
        self.store_set(set.clone().into(), action, silent).await
    }

    /// Changes flags by UID.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn uid_store(
        &mut self,
        set: &UidSet,
        action: StoreAction,
        silent: bool,
    ) -> Result<Vec<Fetched>> {
        self.store_set(set.clone().into(), action, silent).await
    }

    async fn store_set(
        &mut self,
        set: MessageSet,
        action: StoreAction,
        silent: bool,
    ) -> Result<Vec<Fetched>> {
        self.require_selected("STORE")?;
        let result = self.run(&Command::Store { set, action, silent }).await?;
        Ok(self.collect_fetched(result))
    }

    fn collect_fetched(&self, result: CommandResult) -> Vec<Fetched> {
        result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Fetch { seq, items } => {
                    let uid = items
                        .iter()
                        .find_map(|item| match item {
                            FetchItem::Uid(uid) => Some(*uid),
                            _ => None,
                        })
                        .or_else(|| self.selected.as_ref().and_then(|s| s.uid(seq)));
                    Some(Fetched { seq, uid, items })
                }
                _ => None,
            })
            .collect()
    }

    /// Searches by sequence number.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<SeqNum>> {
        let hits = self.search_raw(criteria, false).await?;
        Ok(hits.into_iter().filter_map(SeqNum::new).collect())
    }

    /// Searches and returns UIDs.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn uid_search(&mut self, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        let hits = self.search_raw(criteria, true).await?;
        Ok(hits.into_iter().filter_map(Uid::new).collect())
    }

    async fn search_raw(&mut self, criteria: SearchCriteria, uid: bool) -> Result<Vec<u32>> {
        self.require_selected("SEARCH")?;
        let result = self.run(&Command::Search { criteria, uid }).await?;
        Ok(result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Search(hits) => Some(hits),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// Copies messages by sequence number.
    ///
    /// # Errors
    ///
    /// Returns the command's error; `[TRYCREATE]` means the target is
    /// missing.
    pub async fn copy(&mut self, set: &SequenceSet, mailbox: &str) -> Result<()> {
        self.copy_set(set.clone().into(), mailbox).await
    }

    /// Copies messages by UID.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn uid_copy(&mut self, set: &UidSet, mailbox: &str) -> Result<()> {
        self.copy_set(set.clone().into(), mailbox).await
    }

    async fn copy_set(&mut self, set: MessageSet, mailbox: &str) -> Result<()> {
        self.require_selected("COPY")?;
        self.run(&Command::Copy {
            set,
            mailbox: Mailbox::new(mailbox),
        })
        .await
        .map(drop)
    }

    /// Permanently removes messages flagged `\Deleted`. Returns the
    /// sequence numbers as the server reported them, in order.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        self.require_selected("EXPUNGE")?;
        let result = self.run(&Command::Expunge).await?;
        Ok(expunged(&result))
    }

    /// Expunges only the given UIDs (RFC 4315).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] without the UIDPLUS capability.
    pub async fn uid_expunge(&mut self, uids: &UidSet) -> Result<Vec<SeqNum>> {
        self.require_selected("UID EXPUNGE")?;
        if !self.capabilities.has(&Capability::UidPlus) {
            return Err(Error::Unsupported("UIDPLUS".into()));
        }
        let result = self.run(&Command::UidExpunge { uids: uids.clone() }).await?;
        Ok(expunged(&result))
    }
}

fn expunged(result: &CommandResult) -> Vec<SeqNum> {
    result
        .responses
        .iter()
        .filter_map(|r| match r {
            UntaggedResponse::Expunge(seq) => Some(*seq),
            _ => None,
        })
        .collect()
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

    use super::super::tests::{collect, connect};
    use super::super::ConnectionState;
    use super::*;
    use crate::command::FetchAttribute;
    use crate::handler::MailboxEvent;
    use crate::types::Flag;

    const SELECTED: &[u8] = b"* 3 EXISTS\r\nA0001 OK [READ-WRITE] done\r\n";

    fn seq(n: u32) -> SeqNum {
        SeqNum::new(n).unwrap()
    }

    #[tokio::test]
    async fn fetch_needs_selection() {
        let mock = Builder::new().read(b"* PREAUTH hi\r\n").build();
        let mut conn = connect(mock).await;
        let err = conn.fetch(&SequenceSet::all(), FetchItems::Fast).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn fetch_fills_uid_cache() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(SELECTED)
            .write(b"A0002 FETCH 1:* (UID FLAGS)\r\n")
            .read(b"* 1 FETCH (UID 101 FLAGS (\\Seen))\r\n* 2 FETCH (UID 102 FLAGS ())\r\n")
            .read(b"* 3 FETCH (UID 103 FLAGS (\\Flagged))\r\nA0002 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        let mut events = collect(&mut conn);
        conn.select("INBOX").await.unwrap();

        let items = FetchItems::Items(vec![FetchAttribute::Uid, FetchAttribute::Flags]);
        let fetched = conn.fetch(&SequenceSet::from_start(1).unwrap(), items).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].uid, Uid::new(101));
        assert!(fetched[0].flags().unwrap().is_seen());
        assert_eq!(conn.selected().unwrap().uid(seq(3)), Uid::new(103));

        // Solicited FETCH data is not reported as a flag change.
        drop(conn);
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, MailboxEvent::FlagsChanged { .. }));
        }
    }

    #[tokio::test]
    async fn expunge_during_fetch_shifts_cache() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(SELECTED)
            .write(b"A0002 UID FETCH 1:* UID\r\n")
            .read(b"* 1 FETCH (UID 10)\r\n* 2 FETCH (UID 20)\r\n* 3 FETCH (UID 30)\r\nA0002 OK\r\n")
            .write(b"A0003 UID FETCH 30 FLAGS\r\n")
            .read(b"* 1 EXPUNGE\r\n* 2 FETCH (UID 30 FLAGS (\\Seen))\r\nA0003 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        let mut events = collect(&mut conn);
        conn.select("INBOX").await.unwrap();

        conn.uid_fetch(&UidSet::from_start(1).unwrap(), FetchItems::Items(vec![FetchAttribute::Uid]))
            .await
            .unwrap();
        let fetched = conn
            .uid_fetch(&UidSet::single(30).unwrap(), FetchItems::Items(vec![FetchAttribute::Flags]))
            .await
            .unwrap();
        assert_eq!(fetched[0].seq, seq(2));

        let selected = conn.selected().unwrap();
        assert_eq!(selected.status().exists, 2);
        assert_eq!(selected.uid(seq(1)), Uid::new(20));
        assert_eq!(selected.uid(seq(2)), Uid::new(30));

        let mut saw_expunge = false;
        while let Ok(event) = events.try_recv() {
            if let MailboxEvent::Expunge { seq: s, uid } = event {
                assert_eq!(s, seq(1));
                assert_eq!(uid, Uid::new(10));
                saw_expunge = true;
            }
        }
        assert!(saw_expunge);
    }

    #[tokio::test]
    async fn unsolicited_flag_change_during_noop() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(SELECTED)
            .write(b"A0002 NOOP\r\n")
            .read(b"* 2 FETCH (FLAGS (\\Deleted))\r\n* 4 EXISTS\r\nA0002 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        let mut events = collect(&mut conn);
        conn.select("INBOX").await.unwrap();
        conn.noop().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.iter().any(|e| matches!(e, MailboxEvent::FlagsChanged { seq: s, .. } if *s == seq(2))));
        assert!(seen.contains(&MailboxEvent::Exists(4)));
    }

    #[tokio::test]
    async fn store_search_copy_expunge() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1 UIDPLUS] hi\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(SELECTED)
            .write(b"A0002 STORE 2 +FLAGS (\\Deleted)\r\n")
            .read(b"* 2 FETCH (FLAGS (\\Deleted))\r\nA0002 OK\r\n")
            .write(b"A0003 SEARCH DELETED\r\n")
            .read(b"* SEARCH 2\r\nA0003 OK\r\n")
            .write(b"A0004 COPY 2 Trash\r\n")
            .read(b"A0004 OK [COPYUID 9 2 7] copied\r\n")
            .write(b"A0005 EXPUNGE\r\n")
            .read(b"* 2 EXPUNGE\r\nA0005 OK\r\n")
            .write(b"A0006 UID EXPUNGE 5\r\n")
            .read(b"A0006 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        conn.select("INBOX").await.unwrap();

        let one = SequenceSet::single(2).unwrap();
        let stored = conn
            .store(&one, StoreAction::Add(vec![Flag::Deleted]), false)
            .await
            .unwrap();
        assert!(stored[0].flags().unwrap().is_deleted());
        assert_eq!(conn.search(SearchCriteria::Deleted).await.unwrap(), vec![seq(2)]);
        conn.copy(&one, "Trash").await.unwrap();
        assert_eq!(conn.expunge().await.unwrap(), vec![seq(2)]);
        assert_eq!(conn.selected().unwrap().status().exists, 2);
        assert!(conn.uid_expunge(&UidSet::single(5).unwrap()).await.unwrap().is_empty());
        assert_eq!(conn.state(), ConnectionState::Selected);
    }

    #[tokio::test]
    async fn uid_expunge_needs_uidplus() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(SELECTED)
            .build();
        let mut conn = connect(mock).await;
        conn.select("INBOX").await.unwrap();
        assert!(matches!(
            conn.uid_expunge(&UidSet::single(1).unwrap()).await,
            Err(Error::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn uid_search() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(SELECTED)
            .write(b"A0002 UID SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 4 9\r\nA0002 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        conn.select("INBOX").await.unwrap();
        let uids = conn.uid_search(SearchCriteria::Unseen).await.unwrap();
        assert_eq!(uids, vec![Uid::new(4).unwrap(), Uid::new(9).unwrap()]);
    }
}
