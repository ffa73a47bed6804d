//! Transport streams.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Security};
use crate::{Error, Result};

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Upgrades a plaintext stream to TLS after STARTTLS.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let connector = create_tls_connector();
                let server_name = ServerName::try_from(host.to_string())?;
                let tls = connector.connect(server_name, tcp).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::InvalidState("stream is already TLS".to_string())),
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_tls() { "ImapStream::Tls" } else { "ImapStream::Plain" })
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector trusting the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Opens the transport described by `config`.
///
/// Implicit TLS is negotiated here; STARTTLS happens after the greeting.
/// Any failure, including the connect timeout, is reported as
/// [`Error::Connect`].
pub async fn open(config: &Config) -> Result<ImapStream> {
    let attempt = async {
        match config.security {
            Security::Implicit => connect_tls(&config.host, config.port).await,
            Security::None | Security::StartTls => connect_plain(&config.host, config.port).await,
        }
    };

    match tokio::time::timeout(config.connect_timeout, attempt).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(err)) => Err(Error::Connect(format!(
            "{}:{}: {err}",
            config.host, config.port
        ))),
        Err(_) => Err(Error::Connect(format!(
            "{}:{}: timed out after {:?}",
            config.host, config.port, config.connect_timeout
        ))),
    }
}

/// Connects to a server with TLS from the start.
pub async fn connect_tls(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = create_tls_connector().connect(server_name, tcp).await?;
    Ok(ImapStream::Tls(Box::new(tls)))
}

/// Connects to a server without TLS (for STARTTLS or testing).
pub async fn connect_plain(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    Ok(ImapStream::Plain(tcp))
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
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .connect_timeout(Duration::from_secs(5))
            .build();
        assert!(matches!(open(&config).await, Err(Error::Connect(_))));
    }

    #[tokio::test]
    async fn plain_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = Config::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .build();
        let stream = open(&config).await.unwrap();
        assert!(!stream.is_tls());
    }
}
