//! The session state machine: one GET exchange from resolution to shutdown.
//!
//! # Design
//! Each stage is an `async fn` on `Session` and the stages must run in order:
//!
//! ```text
//! Init -> Resolved -> Connected -> [Secured] -> Sent -> Received -> ShutDown
//! ```
//!
//! `Session` records its transport, the last stage reached and whether a stage
//! has failed. A TLS session must pass through `Secured` before sending, and a
//! plain session never enters it. Entering a stage out of order, or after a
//! failure, returns
//! `SessionError::OutOfOrder` without doing any I/O. Ownership does the rest:
//! the connector hands out the stream, `secure` consumes the plain stream and
//! returns the secured one, and `shut_down` consumes whichever is in use, so a
//! session can never hold more than one connection.
//!
//! `fetch_plain` and `fetch_tls` chain the stages for the two variants. A
//! failure before delivery ends the exchange without a shutdown attempt; the
//! stream is released on drop.

use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_rustls::client::TlsStream;
use tracing::{debug, trace};

use crate::channel::Channel;
use crate::codec::{ParseError, ResponseDecoder};
use crate::error::SessionError;
use crate::http::{HttpRequest, HttpResponse};
use crate::net::{Connect, Resolve};
use crate::params::SessionParams;
use crate::tls::{self, TlsContext};

/// Initial capacity of the read buffer, and the minimum spare room reserved
/// before each read.
const READ_CHUNK: usize = 4096;

/// Progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Resolved,
    Connected,
    Secured,
    Sent,
    Received,
    ShutDown,
}

/// The transport variant a session runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Tls,
}

/// One exchange in progress.
#[derive(Debug)]
pub struct Session<'a> {
    params: &'a SessionParams,
    transport: Transport,
    stage: Stage,
    failed: bool,
}

impl<'a> Session<'a> {
    pub fn new(params: &'a SessionParams, transport: Transport) -> Self {
        Self {
            params,
            transport,
            stage: Stage::Init,
            failed: false,
        }
    }

    pub fn params(&self) -> &SessionParams {
        self.params
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The last stage completed successfully.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    fn enter(&self, attempted: Stage, from: &[Stage]) -> Result<(), SessionError> {
        if self.failed || !from.contains(&self.stage) {
            return Err(SessionError::OutOfOrder {
                reached: self.stage,
                attempted,
            });
        }
        Ok(())
    }

    fn settle<T>(
        &mut self,
        reached: Stage,
        result: Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        match &result {
            Ok(_) => {
                debug!(stage = ?reached, "stage complete");
                self.stage = reached;
            }
            Err(err) => {
                debug!(stage = ?reached, %err, "stage failed");
                self.failed = true;
            }
        }
        result
    }

    /// Looks up the endpoint candidates for the session's host and port.
    pub async fn resolve<R: Resolve>(
        &mut self,
        resolver: &R,
    ) -> Result<Vec<SocketAddr>, SessionError> {
        self.enter(Stage::Resolved, &[Stage::Init])?;
        let result = match resolver.resolve(&self.params.host, &self.params.port).await {
            Ok(endpoints) if endpoints.is_empty() => Err(SessionError::Resolution(
                io::Error::new(io::ErrorKind::NotFound, "host resolved to no endpoints"),
            )),
            Ok(endpoints) => Ok(endpoints),
            Err(err) => Err(SessionError::Resolution(err)),
        };
        self.settle(Stage::Resolved, result)
    }

    /// Connects to the first candidate that accepts, trying them in order.
    pub async fn connect<C: Connect>(
        &mut self,
        connector: &C,
        endpoints: Vec<SocketAddr>,
    ) -> Result<C::Stream, SessionError> {
        self.enter(Stage::Connected, &[Stage::Resolved])?;
        let mut last_err = None;
        for addr in endpoints {
            match connector.connect(addr).await {
                Ok(stream) => {
                    debug!(%addr, kind = <C::Stream as Channel>::KIND, "connected");
                    return self.settle(Stage::Connected, Ok(stream));
                }
                Err(err) => {
                    debug!(%addr, %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }
        let err = last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no endpoints to connect to")
        });
        self.settle(Stage::Connected, Err(SessionError::Connection(err)))
    }

    /// Performs the client TLS handshake over `stream`, presenting the host as
    /// the server name. Only a TLS session can be secured.
    pub async fn secure<S: Channel>(
        &mut self,
        tls: &TlsContext,
        stream: S,
    ) -> Result<TlsStream<S>, SessionError> {
        let from: &[Stage] = match self.transport {
            Transport::Tls => &[Stage::Connected],
            Transport::Plain => &[],
        };
        self.enter(Stage::Secured, from)?;
        let name = match tls::server_name(&self.params.host) {
            Ok(name) => name,
            Err(err) => {
                let err = SessionError::TlsSetup(err.to_string());
                return self.settle(Stage::Secured, Err(err));
            }
        };
        let result = tls
            .connector()
            .connect(name, stream)
            .await
            .map_err(SessionError::Handshake);
        self.settle(Stage::Secured, result)
    }

    /// Writes the GET request and returns what was sent.
    pub async fn send<S: Channel>(&mut self, stream: &mut S) -> Result<HttpRequest, SessionError> {
        let ready = match self.transport {
            Transport::Plain => Stage::Connected,
            Transport::Tls => Stage::Secured,
        };
        self.enter(Stage::Sent, &[ready])?;
        let request = HttpRequest::get(self.params);
        let bytes = request.encode();
        let written = async {
            stream.write_all(&bytes).await?;
            stream.flush().await
        }
        .await;
        let result = written.map(|()| request).map_err(SessionError::Write);
        self.settle(Stage::Sent, result)
    }

    /// Reads until `buf` holds a complete response, and returns it.
    pub async fn receive<S: Channel>(
        &mut self,
        stream: &mut S,
        buf: &mut BytesMut,
    ) -> Result<HttpResponse, SessionError> {
        self.enter(Stage::Received, &[Stage::Sent])?;
        let result = read_response(stream, buf).await.map_err(SessionError::Read);
        self.settle(Stage::Received, result)
    }

    /// Closes the channel, treating the transport's benign race as success.
    pub async fn shut_down<S: Channel>(&mut self, mut stream: S) -> Result<(), SessionError> {
        self.enter(Stage::ShutDown, &[Stage::Received])?;
        let result = match stream.close().await {
            Ok(()) => Ok(()),
            Err(err) if S::is_benign_close(&err) => {
                debug!(kind = S::KIND, %err, "peer closed first");
                Ok(())
            }
            Err(err) => Err(SessionError::Shutdown(err)),
        };
        self.settle(Stage::ShutDown, result)
    }
}

async fn read_response<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut BytesMut,
) -> io::Result<HttpResponse> {
    let mut decoder = ResponseDecoder::new();
    loop {
        if let Some(response) = decoder.decode(buf, false)? {
            return Ok(response);
        }
        buf.reserve(READ_CHUNK);
        let n = stream.read_buf(buf).await?;
        trace!(n, buffered = buf.len(), "read");
        if n == 0 {
            return decoder
                .decode(buf, true)?
                .ok_or_else(|| ParseError::PartialMessage.into());
        }
    }
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Runs a complete exchange over plain TCP.
///
/// `deliver` receives the response before the shutdown stage starts, so a
/// `SessionError::Shutdown` never means the response was lost.
pub async fn fetch_plain<R, C, F>(
    params: &SessionParams,
    resolver: &R,
    connector: &C,
    deliver: F,
) -> Result<(), SessionError>
where
    R: Resolve,
    C: Connect,
    F: FnOnce(HttpResponse),
{
    let mut session = Session::new(params, Transport::Plain);
    let endpoints = session.resolve(resolver).await?;
    let stream = session.connect(connector, endpoints).await?;
    exchange(&mut session, stream, deliver).await
}

/// Runs a complete exchange over TLS, trusting the roots in `tls`.
pub async fn fetch_tls<R, C, F>(
    params: &SessionParams,
    resolver: &R,
    connector: &C,
    tls: &TlsContext,
    deliver: F,
) -> Result<(), SessionError>
where
    R: Resolve,
    C: Connect,
    F: FnOnce(HttpResponse),
{
    let mut session = Session::new(params, Transport::Tls);
    let endpoints = session.resolve(resolver).await?;
    let stream = session.connect(connector, endpoints).await?;
    let stream = session.secure(tls, stream).await?;
    exchange(&mut session, stream, deliver).await
}

async fn exchange<S, F>(
    session: &mut Session<'_>,
    mut stream: S,
    deliver: F,
) -> Result<(), SessionError>
where
    S: Channel,
    F: FnOnce(HttpResponse),
{
    session.send(&mut stream).await?;
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let response = session.receive(&mut stream, &mut buf).await?;
    deliver(response);
    session.shut_down(stream).await
}
