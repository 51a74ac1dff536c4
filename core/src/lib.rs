//! Single-exchange HTTP GET client core.
//!
//! # Overview
//! Performs exactly one GET exchange: resolve the host, connect to the first
//! endpoint that accepts, optionally secure the stream with TLS, send the
//! request, read one complete response, and close the channel.
//!
//! # Design
//! - `Session` is the state machine. Each stage is an `async fn` and the
//!   stages run strictly in order on the caller's task.
//! - `Resolve`, `Connect` and `Channel` are the I/O seams, so the whole
//!   exchange runs against scripted transports in tests.
//! - The TLS trust context is built by the caller and passed in.
//! - `fetch_plain` / `fetch_tls` drive a full exchange and hand the response
//!   to a callback before shutdown starts.

pub mod channel;
pub mod codec;
pub mod error;
pub mod http;
pub mod net;
pub mod params;
pub mod session;
pub mod tls;

pub use channel::Channel;
pub use codec::{ParseError, ResponseDecoder};
pub use error::{SessionError, TrustError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Version};
pub use net::{Connect, DnsResolver, Resolve, TcpConnector};
pub use params::{SessionParams, USER_AGENT};
pub use session::{fetch_plain, fetch_tls, Session, Stage, Transport};
pub use tls::TlsContext;
