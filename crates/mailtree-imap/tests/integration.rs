//! Integration tests for the IMAP client.
//!
//! These tests drive a [`Connection`] over a mock stream that replays a
//! canned server transcript and records what the client wrote.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailtree_imap::command::StatusAttribute;
use mailtree_imap::{
    Command, Config, Connection, ConnectionState, Error, FetchItems, Flag, Ftree, PipelineMode,
    ResponseCode, Security, SeqNum, SequenceSet, Status, UidSet,
};

/// Mock stream that returns predefined responses.
///
/// Reads hit end of stream once the transcript is exhausted.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn config() -> Config {
    Config::builder("imap.example.com")
        .security(Security::None)
        .build()
}

async fn connect(transcript: &[u8]) -> (Connection<MockStream>, Arc<Mutex<Vec<u8>>>) {
    connect_with(transcript, config()).await
}

async fn connect_with(
    transcript: &[u8],
    config: Config,
) -> (Connection<MockStream>, Arc<Mutex<Vec<u8>>>) {
    let (stream, sent) = MockStream::new(transcript);
    let conn = Connection::from_stream(stream, config).await.unwrap();
    (conn, sent)
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&sent.lock().unwrap()).into_owned()
}

#[test]
fn sequence_set_round_trip() {
    let set = SequenceSet::parse("5,1:3,4,9:*").unwrap();
    assert_eq!(set.to_string(), "1:5,9:*");
    assert_eq!(SequenceSet::parse(&set.serialize()).unwrap(), set);

    assert!(set.contains(4));
    assert!(!set.contains(7));
    assert!(set.contains(4_000_000));

    assert!(SequenceSet::parse("").is_err());
    assert!(SequenceSet::parse("0").is_err());
    assert!(SequenceSet::parse("5:2").is_err());
}

#[test]
fn uid_set_round_trip() {
    let uids = UidSet::parse("300:310,200,201").unwrap();
    assert_eq!(uids.to_string(), "200:201,300:310");
    assert_eq!(uids.len(), 13);
}

#[tokio::test]
async fn login_and_select() {
    let (mut conn, sent) = connect(
        b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n\
          A0001 OK [CAPABILITY IMAP4rev1 IDLE NAMESPACE] logged in\r\n\
          * 4 EXISTS\r\n\
          * OK [UIDVALIDITY 7] ok\r\n\
          A0002 OK [READ-WRITE] selected\r\n",
    )
    .await;
    assert_eq!(conn.state(), ConnectionState::Greeted);

    conn.login("user", "secret").await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Authenticated);

    let status = conn.select("INBOX").await.unwrap();
    assert_eq!(status.exists, 4);
    assert_eq!(conn.state(), ConnectionState::Selected);
    assert_eq!(
        sent_text(&sent),
        "A0001 LOGIN user secret\r\nA0002 SELECT INBOX\r\n"
    );
}

#[tokio::test]
async fn select_with_huge_exists() {
    let (mut conn, _sent) = connect(
        b"* PREAUTH hi\r\n\
          * 4000000000 EXISTS\r\n\
          A0001 OK [READ-WRITE] selected\r\n",
    )
    .await;

    let status = conn.select("INBOX").await.unwrap();
    assert_eq!(status.exists, 4_000_000_000);
    let selected = conn.selected().unwrap();
    assert_eq!(selected.status().exists, 4_000_000_000);
    assert_eq!(selected.uid(SeqNum::new(1).unwrap()), None);
}

#[tokio::test]
async fn literal_with_embedded_crlf() {
    let (mut conn, sent) = connect(
        b"* PREAUTH hi\r\n\
          + Ready\r\n\
          A0001 OK APPEND completed\r\n",
    )
    .await;

    let message = b"Subject: hi\r\n\r\nbody";
    let uids = conn.append("Drafts", &[Flag::Draft], None, message).await.unwrap();
    assert!(uids.is_none());
    assert_eq!(
        sent_text(&sent),
        "A0001 APPEND Drafts (\\Draft) {19}\r\nSubject: hi\r\n\r\nbody\r\n"
    );
}

#[tokio::test]
async fn already_exists_keeps_server_text() {
    let (mut conn, _sent) = connect(
        b"* PREAUTH hi\r\n\
          A0001 NO [ALREADYEXISTS] Mailbox \"Work\" already exists\r\n",
    )
    .await;

    let err = conn.create("Work").await.unwrap_err();
    match err {
        Error::Command { status, code, text } => {
            assert_eq!(status, Status::No);
            assert_eq!(code, Some(ResponseCode::AlreadyExists));
            assert_eq!(text, "Mailbox \"Work\" already exists");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(conn.state(), ConnectionState::Authenticated);
}

#[tokio::test]
async fn idle_without_capability_sends_nothing() {
    let (mut conn, sent) = connect(b"* PREAUTH [CAPABILITY IMAP4rev1] hi\r\n").await;

    let err = conn.idle().await.unwrap_err();
    assert!(matches!(err, Error::Unsupported(ref what) if what == "IDLE"));
    assert!(sent.lock().unwrap().is_empty());
    assert_eq!(conn.state(), ConnectionState::Authenticated);
}

#[tokio::test]
async fn renaming_inbox_is_rejected_locally() {
    let (mut conn, sent) = connect(
        b"* PREAUTH [CAPABILITY IMAP4rev1] hi\r\n\
          * LIST (\\Noselect) \"/\" \"\"\r\n\
          A0001 OK\r\n\
          * LIST (\\HasNoChildren) \"/\" INBOX\r\n\
          * LIST (\\HasNoChildren) \"/\" Work\r\n\
          A0002 OK\r\n\
          A0003 OK\r\n",
    )
    .await;

    let mut tree = Ftree::new();
    tree.populate_all(&mut conn).await.unwrap();
    assert!(tree.contains("INBOX"));
    let before = sent.lock().unwrap().len();

    let err = tree.rename(&mut conn, "INBOX", "Old").await.unwrap_err();
    assert!(matches!(err, Error::SpecialMailbox(_)));
    assert_eq!(sent.lock().unwrap().len(), before);
    assert!(tree.contains("INBOX"));
    assert!(!tree.contains("Old"));
}

#[tokio::test]
async fn abrupt_close_during_fetch() {
    let (mut conn, _sent) = connect(
        b"* PREAUTH hi\r\n\
          * 3 EXISTS\r\n\
          A0001 OK [READ-WRITE] selected\r\n\
          * 1 FETCH (FLAGS (\\Seen))\r\n",
    )
    .await;
    conn.select("INBOX").await.unwrap();

    let err = conn.fetch(&SequenceSet::all(), FetchItems::Fast).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_)), "got {err:?}");
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    assert!(conn.noop().await.is_err());
}

#[tokio::test]
async fn empty_fetch_set_is_rejected_before_sending() {
    let (mut conn, sent) = connect(
        b"* PREAUTH hi\r\n\
          * 3 EXISTS\r\n\
          A0001 OK [READ-WRITE] selected\r\n",
    )
    .await;
    conn.select("INBOX").await.unwrap();

    let err = conn
        .fetch(&SequenceSet::empty(), FetchItems::Fast)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "got {err:?}");
    assert!(!err.is_fatal());
    assert_eq!(sent_text(&sent), "A0001 SELECT INBOX\r\n");
    assert_eq!(conn.state(), ConnectionState::Selected);
}

#[tokio::test]
async fn pipelined_commands_share_one_write() {
    let config = Config::builder("imap.example.com")
        .security(Security::None)
        .pipelining(PipelineMode::Enabled)
        .build();
    let (mut conn, sent) = connect_with(
        b"* PREAUTH hi\r\n\
          * STATUS Sent (MESSAGES 2)\r\n\
          A0001 OK\r\n\
          * STATUS Trash (MESSAGES 9)\r\n\
          A0002 OK\r\n",
        config,
    )
    .await;

    let status = |mailbox: &str| Command::Status {
        mailbox: mailbox.into(),
        items: vec![StatusAttribute::Messages],
    };
    let first = conn.send(&status("Sent")).unwrap();
    let second = conn.send(&status("Trash")).unwrap();
    conn.flush().await.unwrap();
    assert_eq!(
        sent_text(&sent),
        "A0001 STATUS Sent (MESSAGES)\r\nA0002 STATUS Trash (MESSAGES)\r\n"
    );

    conn.wait(&second).await.unwrap();
    conn.wait(&first).await.unwrap();
}
