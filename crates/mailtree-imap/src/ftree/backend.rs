//! The server operations the folder tree needs.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::Result;
use crate::connection::Connection;
use crate::types::{ListResponse, Namespaces};

/// Mailbox commands behind the folder tree.
///
/// [`Connection`] implements this; tests and offline callers can supply
/// their own.
pub trait MailboxBackend {
    /// `LIST reference pattern`.
    fn list(&mut self, reference: &str, pattern: &str) -> impl Future<Output = Result<Vec<ListResponse>>>;

    /// `LSUB reference pattern`.
    fn lsub(&mut self, reference: &str, pattern: &str) -> impl Future<Output = Result<Vec<ListResponse>>>;

    /// Returns [`Error::Unsupported`](crate::Error::Unsupported) when the
    /// server has no NAMESPACE support.
    fn namespace(&mut self) -> impl Future<Output = Result<Namespaces>>;

    /// Creates a mailbox.
    fn create(&mut self, mailbox: &str) -> impl Future<Output = Result<()>>;

    /// Deletes a mailbox.
    fn delete(&mut self, mailbox: &str) -> impl Future<Output = Result<()>>;

    /// Renames a mailbox and, on the server, its children.
    fn rename(&mut self, from: &str, to: &str) -> impl Future<Output = Result<()>>;

    /// Adds a mailbox to the subscription list.
    fn subscribe(&mut self, mailbox: &str) -> impl Future<Output = Result<()>>;

    /// Removes a mailbox from the subscription list.
    fn unsubscribe(&mut self, mailbox: &str) -> impl Future<Output = Result<()>>;
}

impl<S> MailboxBackend for Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        Self::list(self, reference, pattern).await
    }

    async fn lsub(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        Self::lsub(self, reference, pattern).await
    }

    async fn namespace(&mut self) -> Result<Namespaces> {
        Self::namespace(self).await
    }

    async fn create(&mut self, mailbox: &str) -> Result<()> {
        Self::create(self, mailbox).await
    }

    async fn delete(&mut self, mailbox: &str) -> Result<()> {
        Self::delete(self, mailbox).await
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        Self::rename(self, from, to).await
    }

    async fn subscribe(&mut self, mailbox: &str) -> Result<()> {
        Self::subscribe(self, mailbox).await
    }

    async fn unsubscribe(&mut self, mailbox: &str) -> Result<()> {
        Self::unsubscribe(self, mailbox).await
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

    use crate::connection::Connection;
    use crate::connection::{Config, Security};
    use crate::ftree::{Ftree, SpecialUse};

    fn config() -> Config {
        Config::builder("imap.example.com").security(Security::None).build()
    }

    #[tokio::test]
    async fn populate_over_connection() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1 NAMESPACE SPECIAL-USE] hi\r\n")
            .write(b"A0001 NAMESPACE\r\n")
            .read(b"* NAMESPACE ((\"\" \"/\")) NIL ((\"Shared/\" \"/\"))\r\nA0001 OK\r\n")
            .write(b"A0002 LIST \"\" *\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
            .read(b"* LIST (\\HasNoChildren \\Sent) \"/\" \"Sent Items\"\r\n")
            .read(b"* LIST (\\HasChildren) \"/\" Projects\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Projects/Alpha\r\n")
            .read(b"A0002 OK\r\n")
            .write(b"A0003 LSUB \"\" *\r\n")
            .read(b"* LSUB () \"/\" Projects/Alpha\r\nA0003 OK\r\n")
            .write(b"A0004 LIST \"\" Shared/*\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Shared/team\r\nA0004 OK\r\n")
            .write(b"A0005 LSUB \"\" Shared/*\r\n")
            .read(b"A0005 OK\r\n")
            .write(b"A0006 DELETE Projects/Alpha\r\n")
            .read(b"A0006 OK\r\n")
            .build();
        let mut conn = Connection::from_stream(mock, config()).await.unwrap();
        let mut tree = Ftree::new();
        tree.populate_all(&mut conn).await.unwrap();

        assert_eq!(tree.len(), 6);
        assert_eq!(tree.node("Sent Items").unwrap().special_use(), Some(SpecialUse::Sent));
        assert!(tree.node("Projects/Alpha").unwrap().is_subscribed());
        assert!(tree.node("Shared").unwrap().is_container());

        tree.delete(&mut conn, "Projects/Alpha").await.unwrap();
        assert!(!tree.contains("Projects/Alpha"));
        assert!(tree.contains("Projects"));
    }
}
