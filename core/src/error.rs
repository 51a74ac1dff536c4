//! Error types for a session.
//!
//! # Design
//! `SessionError` has one variant per stage, each carrying the low-level
//! cause. `Display` renders `<step>: <cause>`, the line the command reports
//! on standard error. `Shutdown` is the only variant that can occur after the
//! response was delivered; `after_delivery` lets callers tell it apart.

use std::fmt;
use std::io;

use tokio_rustls::rustls;

use crate::session::Stage;

/// Errors returned by the session stages.
#[derive(Debug)]
pub enum SessionError {
    /// Name lookup failed or produced no endpoints.
    Resolution(io::Error),

    /// Every endpoint candidate refused; carries the last attempt's cause.
    Connection(io::Error),

    /// The host cannot be used as a TLS server name.
    TlsSetup(String),

    /// The TLS handshake failed, certificate validation included.
    Handshake(io::Error),

    Write(io::Error),

    /// Reading or parsing the response failed. Parse failures arrive as
    /// `InvalidData` errors wrapping a `codec::ParseError`.
    Read(io::Error),

    /// Closing the channel failed for a reason other than the benign race.
    Shutdown(io::Error),

    /// A stage was entered out of order or after an earlier failure.
    OutOfOrder { reached: Stage, attempted: Stage },
}

impl SessionError {
    /// Name of the step that failed, as printed on standard error.
    pub fn step(&self) -> &'static str {
        match self {
            SessionError::Resolution(_) => "resolve",
            SessionError::Connection(_) => "connect",
            SessionError::TlsSetup(_) => "tls setup",
            SessionError::Handshake(_) => "handshake",
            SessionError::Write(_) => "write",
            SessionError::Read(_) => "read",
            SessionError::Shutdown(_) => "shutdown",
            SessionError::OutOfOrder { .. } => "sequence",
        }
    }

    /// Whether the response had already been delivered when this error
    /// occurred.
    pub fn after_delivery(&self) -> bool {
        matches!(self, SessionError::Shutdown(_))
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = self.step();
        match self {
            SessionError::Resolution(err)
            | SessionError::Connection(err)
            | SessionError::Handshake(err)
            | SessionError::Write(err)
            | SessionError::Read(err)
            | SessionError::Shutdown(err) => write!(f, "{step}: {err}"),
            SessionError::TlsSetup(msg) => write!(f, "{step}: {msg}"),
            SessionError::OutOfOrder { reached, attempted } => {
                write!(f, "{step}: cannot enter {attempted:?} after {reached:?}")
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Resolution(err)
            | SessionError::Connection(err)
            | SessionError::Handshake(err)
            | SessionError::Write(err)
            | SessionError::Read(err)
            | SessionError::Shutdown(err) => Some(err),
            SessionError::TlsSetup(_) | SessionError::OutOfOrder { .. } => None,
        }
    }
}

/// Errors from loading trust material.
#[derive(Debug)]
pub enum TrustError {
    /// The PEM source could not be read.
    Io(io::Error),

    /// The PEM source held no certificates.
    NoCertificates,

    /// A certificate was not usable as a trust anchor.
    Rejected(rustls::Error),
}

impl fmt::Display for TrustError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustError::Io(err) => write!(f, "cannot read certificates: {err}"),
            TrustError::NoCertificates => write!(f, "no certificates found"),
            TrustError::Rejected(err) => write!(f, "certificate rejected: {err}"),
        }
    }
}

impl std::error::Error for TrustError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrustError::Io(err) => Some(err),
            TrustError::NoCertificates => None,
            TrustError::Rejected(err) => Some(err),
        }
    }
}
