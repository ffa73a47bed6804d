//! Mailbox commands: selection, listing and management.

use tokio::io::{AsyncRead, AsyncWrite};

use super::{Connection, ConnectionState, SelectedMailbox};
use crate::command::{Command, StatusAttribute};
use crate::parser::{StatusItem, UntaggedResponse};
use crate::types::{
    Capability, Flag, ListResponse, Mailbox, MailboxStatus, Namespaces, ResponseCode, UidSet,
    UidValidity,
};
use crate::{Error, Result};

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Selects a mailbox read-write.
    ///
    /// The previous selection is forgotten as soon as the command is sent.
    /// On failure no mailbox is selected.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        self.open_mailbox(Mailbox::new(mailbox), false).await
    }

    /// Selects a mailbox read-only.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        self.open_mailbox(Mailbox::new(mailbox), true).await
    }

    async fn open_mailbox(&mut self, mailbox: Mailbox, read_only: bool) -> Result<MailboxStatus> {
        self.require_authenticated(if read_only { "EXAMINE" } else { "SELECT" })?;

        self.selected = None;
        self.transition(ConnectionState::Authenticated);

        let command = if read_only {
            Command::Examine {
                mailbox: mailbox.clone(),
            }
        } else {
            Command::Select {
                mailbox: mailbox.clone(),
            }
        };
        let result = self.run(&command).await?;

        let selected = SelectedMailbox::from_completion(mailbox, read_only, &result);
        let status = selected.status().clone();
        tracing::debug!(
            mailbox = %selected.mailbox(),
            exists = status.exists,
            read_only = status.read_only,
            "mailbox selected"
        );
        self.selected = Some(selected);
        self.transition(ConnectionState::Selected);
        Ok(status)
    }

    /// Closes the selected mailbox, expunging deleted messages.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn close(&mut self) -> Result<()> {
        self.require_selected("CLOSE")?;
        self.run(&Command::Close).await?;
        self.deselect();
        Ok(())
    }

    /// Closes the selected mailbox without expunging (RFC 3691).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] without the UNSELECT capability.
    pub async fn unselect(&mut self) -> Result<()> {
        self.require_selected("UNSELECT")?;
        if !self.capabilities.has(&Capability::Unselect) {
            return Err(Error::Unsupported("UNSELECT".into()));
        }
        self.run(&Command::Unselect).await?;
        self.deselect();
        Ok(())
    }

    fn deselect(&mut self) {
        self.selected = None;
        self.transition(ConnectionState::Authenticated);
    }

    /// Lists mailboxes matching `pattern` under `reference`.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.require_authenticated("LIST")?;
        let result = self
            .run(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        Ok(result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::List(entry) => Some(entry),
                _ => None,
            })
            .collect())
    }

    /// Lists subscribed mailboxes.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn lsub(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.require_authenticated("LSUB")?;
        let result = self
            .run(&Command::Lsub {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;
        Ok(result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Lsub(entry) => Some(entry),
                _ => None,
            })
            .collect())
    }

    /// Requests status items for a mailbox other than the selected one.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn status(&mut self, mailbox: &str, items: &[StatusAttribute]) -> Result<Vec<StatusItem>> {
        self.require_authenticated("STATUS")?;
        let result = self
            .run(&Command::Status {
                mailbox: Mailbox::new(mailbox),
                items: items.to_vec(),
            })
            .await?;
        Ok(result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Status { items, .. } => Some(items),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// Requests the namespace layout (RFC 2342).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] without the NAMESPACE capability.
    pub async fn namespace(&mut self) -> Result<Namespaces> {
        self.require_authenticated("NAMESPACE")?;
        if !self.capabilities.has(&Capability::Namespace) {
            return Err(Error::Unsupported("NAMESPACE".into()));
        }
        let result = self.run(&Command::Namespace).await?;
        result
            .responses
            .into_iter()
            .find_map(|r| match r {
                UntaggedResponse::Namespace(ns) => Some(ns),
                _ => None,
            })
            .ok_or_else(|| Error::Protocol("NAMESPACE completed without data".into()))
    }

    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn create(&mut self, mailbox: &str) -> Result<()> {
        self.mailbox_command("CREATE", Command::Create {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn delete(&mut self, mailbox: &str) -> Result<()> {
        self.mailbox_command("DELETE", Command::Delete {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.mailbox_command("RENAME", Command::Rename {
            from: Mailbox::new(from),
            to: Mailbox::new(to),
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn subscribe(&mut self, mailbox: &str) -> Result<()> {
        self.mailbox_command("SUBSCRIBE", Command::Subscribe {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn unsubscribe(&mut self, mailbox: &str) -> Result<()> {
        self.mailbox_command("UNSUBSCRIBE", Command::Unsubscribe {
            mailbox: Mailbox::new(mailbox),
        })
        .await
    }

    async fn mailbox_command(&mut self, name: &str, command: Command) -> Result<()> {
        self.require_authenticated(name)?;
        self.run(&command).await.map(drop)
    }

    /// Appends a message to a mailbox.
    ///
    /// `date` is an IMAP `date-time` such as `"17-Jul-1996 02:44:25 -0700"`.
    /// Returns the assigned UIDs when the server supports UIDPLUS.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: &[Flag],
        date: Option<&str>,
        message: &[u8],
    ) -> Result<Option<(UidValidity, UidSet)>> {
        self.require_authenticated("APPEND")?;
        let result = self
            .run(&Command::Append {
                mailbox: Mailbox::new(mailbox),
                flags: flags.to_vec(),
                date: date.map(str::to_string),
                message: message.to_vec(),
            })
            .await?;
        Ok(match result.code {
            Some(ResponseCode::AppendUid { uidvalidity, uids }) => Some((uidvalidity, uids)),
            _ => None,
        })
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
    use super::*;
    use crate::types::{MailboxAttribute, NamespaceKind, Status};

    #[tokio::test]
    async fn select_then_failed_select() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 18 EXISTS\r\n* 2 RECENT\r\n* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"* OK [UIDNEXT 4392] predicted\r\n* FLAGS (\\Seen \\Deleted)\r\n")
            .read(b"A0001 OK [READ-WRITE] SELECT completed\r\n")
            .write(b"A0002 SELECT Missing\r\n")
            .read(b"A0002 NO [NONEXISTENT] no such mailbox\r\n")
            .build();
        let mut conn = connect(mock).await;

        let status = conn.select("inbox").await.unwrap();
        assert_eq!(status.exists, 18);
        assert_eq!(status.recent, 2);
        assert!(!status.read_only);
        assert_eq!(conn.state(), ConnectionState::Selected);
        assert!(conn.selected().unwrap().mailbox().is_inbox());

        let err = conn.select("Missing").await.unwrap_err();
        assert_eq!(err.response_code(), Some(&ResponseCode::Nonexistent));
        assert_eq!(conn.state(), ConnectionState::Authenticated);
        assert!(conn.selected().is_none());
    }

    #[tokio::test]
    async fn examine_is_read_only() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 EXAMINE Archive\r\n")
            .read(b"* 3 EXISTS\r\nA0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 CLOSE\r\n")
            .read(b"A0002 OK closed\r\n")
            .build();
        let mut conn = connect(mock).await;
        assert!(conn.examine("Archive").await.unwrap().read_only);
        conn.close().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Authenticated);
    }

    #[tokio::test]
    async fn commands_need_authentication() {
        let mock = Builder::new().read(b"* OK hi\r\n").build();
        let mut conn = connect(mock).await;
        assert!(matches!(conn.select("INBOX").await, Err(Error::InvalidState(_))));
        assert!(matches!(conn.list("", "*").await, Err(Error::InvalidState(_))));
        assert!(matches!(conn.close().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn list_and_lsub() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 LIST \"\" *\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
            .read(b"* LIST (\\HasChildren \\Noselect) \"/\" Work\r\n")
            .read(b"A0001 OK LIST completed\r\n")
            .write(b"A0002 LSUB \"\" *\r\n")
            .read(b"* LSUB () \"/\" INBOX\r\nA0002 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        let list = conn.list("", "*").await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[1].has(&MailboxAttribute::NoSelect));
        assert_eq!(list[1].delimiter, Some('/'));
        assert_eq!(conn.lsub("", "*").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_already_exists() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 CREATE Work\r\n")
            .read(b"A0001 NO [ALREADYEXISTS] Mailbox already exists\r\n")
            .build();
        let mut conn = connect(mock).await;
        match conn.create("Work").await.unwrap_err() {
            Error::Command { status, code, text } => {
                assert_eq!(status, Status::No);
                assert_eq!(code, Some(ResponseCode::AlreadyExists));
                assert_eq!(text, "Mailbox already exists");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn namespace_requires_capability() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1 NAMESPACE] hi\r\n")
            .write(b"A0001 NAMESPACE\r\n")
            .read(b"* NAMESPACE ((\"\" \"/\")) ((\"~\" \"/\")) NIL\r\nA0001 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        let ns = conn.namespace().await.unwrap();
        assert_eq!(ns.kind_of("~bob/INBOX"), NamespaceKind::OtherUsers);

        let mock = Builder::new().read(b"* PREAUTH hi\r\n").build();
        let mut conn = connect(mock).await;
        assert!(matches!(conn.namespace().await, Err(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn append_waits_for_continuation() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 APPEND Drafts (\\Draft) {5}\r\n")
            .read(b"+ Ready\r\n")
            .write(b"hello\r\n")
            .read(b"A0001 OK [APPENDUID 38505 3955] APPEND completed\r\n")
            .build();
        let mut conn = connect(mock).await;
        let (validity, uids) = conn
            .append("Drafts", &[Flag::Draft], None, b"hello")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(validity.get(), 38505);
        assert!(uids.contains(3955));
    }

    #[tokio::test]
    async fn status_items() {
        let mock = Builder::new()
            .read(b"* PREAUTH hi\r\n")
            .write(b"A0001 STATUS Sent (MESSAGES UNSEEN)\r\n")
            .read(b"* STATUS Sent (MESSAGES 231 UNSEEN 3)\r\nA0001 OK\r\n")
            .build();
        let mut conn = connect(mock).await;
        let items = conn
            .status("Sent", &[StatusAttribute::Messages, StatusAttribute::Unseen])
            .await
            .unwrap();
        assert_eq!(items, vec![StatusItem::Messages(231), StatusItem::Unseen(3)]);
    }
}
