//! Session parameters.
//!
//! # Design
//! The host, port and target are kept as the text the user supplied. The port
//! may be a number or a well-known service name; `net::service_port` turns it
//! into a number at resolution time.

use crate::http::Version;

/// Product string sent in the `User-Agent` header.
pub const USER_AGENT: &str = concat!("http-get/", env!("CARGO_PKG_VERSION"));

/// Everything one session needs to know about the exchange to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub host: String,
    pub port: String,
    pub target: String,
    pub version: Version,
}

impl SessionParams {
    pub fn new(
        host: impl Into<String>,
        port: impl Into<String>,
        target: impl Into<String>,
        version: Version,
    ) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            target: target.into(),
            version,
        }
    }
}
