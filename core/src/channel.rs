//! Byte-stream channels a session runs over, and how each one closes.
//!
//! # Design
//! Every transport closes differently and reports a different error when the
//! peer got there first. `Channel` pairs the close operation with the
//! classifier for that benign race so the session's shutdown stage stays
//! transport-agnostic.
//!
//! - Plain TCP shuts down both directions of the socket. `NotConnected` means
//!   the peer already tore the connection down.
//! - TLS sends close_notify and waits for the peer's. `UnexpectedEof` means
//!   the peer closed the socket without answering, which most servers do.

use std::future::Future;
use std::io;
use std::net::Shutdown;

use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// A connected, bidirectional byte stream owned by one session.
pub trait Channel: AsyncRead + AsyncWrite + Unpin {
    /// Short transport name used in log events.
    const KIND: &'static str;

    /// Performs the orderly close for this transport.
    fn close(&mut self) -> impl Future<Output = io::Result<()>>;

    /// Whether an error from `close` only reflects the peer having already
    /// gone away.
    fn is_benign_close(err: &io::Error) -> bool;
}

impl Channel for TcpStream {
    const KIND: &'static str = "tcp";

    async fn close(&mut self) -> io::Result<()> {
        SockRef::from(&*self).shutdown(Shutdown::Both)
    }

    fn is_benign_close(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::NotConnected
    }
}

impl<S: Channel> Channel for TlsStream<S> {
    const KIND: &'static str = "tls";

    async fn close(&mut self) -> io::Result<()> {
        AsyncWriteExt::shutdown(self).await?;
        let mut scratch = [0u8; 1024];
        while self.read(&mut scratch).await? != 0 {}
        Ok(())
    }

    fn is_benign_close(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::UnexpectedEof
    }
}
