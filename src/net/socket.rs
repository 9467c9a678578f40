//! The transport socket: plain TCP/Unix, or either wrapped in TLS once the
//! handshake has upgraded the connection (spec §4.4, §6).
//!
//! Grounded on the `Socket`/enum shape in `sqlx_core::net::socket::mod` and
//! `sqlx_core::mysql::connection::tls`, collapsed from that crate's
//! poll-based trait object into a single enum implementing
//! `AsyncRead`/`AsyncWrite` directly, since this crate writes plain `async
//! fn` throughout rather than hand-rolled future state machines.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UnixStream};

#[cfg(feature = "rustls")]
use tokio_rustls::client::TlsStream as RustlsStream;

#[cfg(feature = "native-tls")]
use tokio_native_tls::TlsStream as NativeTlsStream;

use crate::error::{Error, Result};

/// The connection's transport socket, possibly wrapped in TLS.
///
/// Unix-domain sockets are never wrapped in TLS (MySQL never offers it on
/// them, and no deployment relies on it), so only the TCP variants have TLS
/// siblings.
pub(crate) enum MaybeTlsStream {
    Tcp(TcpStream),
    Unix(UnixStream),
    #[cfg(feature = "rustls")]
    Rustls(Box<RustlsStream<TcpStream>>),
    #[cfg(feature = "native-tls")]
    NativeTls(Box<NativeTlsStream<TcpStream>>),
}

impl MaybeTlsStream {
    pub(crate) async fn connect_tcp(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(MaybeTlsStream::Tcp(stream))
    }

    pub(crate) async fn connect_unix(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(MaybeTlsStream::Unix(stream))
    }

    pub(crate) fn is_tls(&self) -> bool {
        match self {
            MaybeTlsStream::Tcp(_) | MaybeTlsStream::Unix(_) => false,
            #[cfg(feature = "rustls")]
            MaybeTlsStream::Rustls(_) => true,
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(_) => true,
        }
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(feature = "rustls")]
            MaybeTlsStream::Rustls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(feature = "rustls")]
            MaybeTlsStream::Rustls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::Unix(s) => Pin::new(s).poll_flush(cx),
            #[cfg(feature = "rustls")]
            MaybeTlsStream::Rustls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(feature = "rustls")]
            MaybeTlsStream::Rustls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Turns a TLS error of any backend into our `Error::Tls`.
pub(crate) fn tls_err(e: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::Tls(Box::new(e))
}
