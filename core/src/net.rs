//! Name resolution and connection establishment.
//!
//! `Resolve` and `Connect` are the seams between the session and the
//! operating system, so tests can supply fixed endpoints or scripted
//! streams.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpStream};

use crate::channel::Channel;

/// Translates a host and service into endpoint candidates, in preference
/// order.
pub trait Resolve {
    fn resolve(
        &self,
        host: &str,
        service: &str,
    ) -> impl Future<Output = io::Result<Vec<SocketAddr>>>;
}

/// Opens a transport connection to one endpoint.
pub trait Connect {
    type Stream: Channel;

    fn connect(&self, addr: SocketAddr) -> impl Future<Output = io::Result<Self::Stream>>;
}

/// Resolves through the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

impl Resolve for DnsResolver {
    async fn resolve(&self, host: &str, service: &str) -> io::Result<Vec<SocketAddr>> {
        let port = service_port(service)?;
        Ok(lookup_host((host, port)).await?.collect())
    }
}

/// Connects plain TCP streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        TcpStream::connect(addr).await
    }
}

/// Maps a numeric port or a well-known service name to a port number.
pub fn service_port(service: &str) -> io::Result<u16> {
    match service {
        "http" => Ok(80),
        "https" => Ok(443),
        _ => service.parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown service {service:?}"),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_named_services() {
        assert_eq!(service_port("8080").unwrap(), 8080);
        assert_eq!(service_port("http").unwrap(), 80);
        assert_eq!(service_port("https").unwrap(), 443);
    }

    #[test]
    fn unknown_service_is_rejected() {
        let err = service_port("gopher").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(service_port("70000").is_err());
    }

    #[tokio::test]
    async fn resolves_loopback_literal() {
        let addrs = DnsResolver.resolve("127.0.0.1", "8080").await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:8080".parse::<SocketAddr>().unwrap()]);
    }
}
