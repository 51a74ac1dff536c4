//! Trust material for the secured variant.
//!
//! # Design
//! A `TlsContext` is built once, before the session starts, and handed to
//! `Session::secure`. The session only consumes it; loading roots from the
//! bundled Mozilla set or from a PEM file happens here.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::pki_types::{InvalidDnsNameError, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::TrustError;

/// Client-side TLS configuration holding the trusted roots.
#[derive(Clone)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
}

impl TlsContext {
    /// Trusts the Mozilla root program bundled by `webpki-roots`.
    pub fn with_webpki_roots() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::from_roots(roots)
    }

    /// Trusts every certificate in the PEM file at `path`.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, TrustError> {
        let file = File::open(path.as_ref()).map_err(TrustError::Io)?;
        Self::from_pem(&mut BufReader::new(file))
    }

    /// Trusts every certificate in a PEM stream. Other PEM sections are
    /// skipped.
    pub fn from_pem(reader: &mut dyn BufRead) -> Result<Self, TrustError> {
        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(reader) {
            let cert = cert.map_err(TrustError::Io)?;
            roots.add(cert).map_err(TrustError::Rejected)?;
        }
        if roots.is_empty() {
            return Err(TrustError::NoCertificates);
        }
        debug!(roots = roots.len(), "loaded trust anchors");
        Ok(Self::from_roots(roots))
    }

    pub fn from_roots(roots: RootCertStore) -> Self {
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    pub(crate) fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.config.clone())
    }
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext").finish_non_exhaustive()
    }
}

/// The identity hint presented to the server: the requested host as a DNS
/// name or IP address.
pub fn server_name(host: &str) -> Result<ServerName<'static>, InvalidDnsNameError> {
    ServerName::try_from(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_name_accepts_hosts_and_addresses() {
        assert!(server_name("example.test").is_ok());
        assert!(server_name("127.0.0.1").is_ok());
        assert!(server_name("::1").is_ok());
    }

    #[test]
    fn server_name_rejects_invalid_names() {
        assert!(server_name("bad host!").is_err());
        assert!(server_name("").is_err());
    }

    #[test]
    fn bundled_roots_build_config_with_sni() {
        let ctx = TlsContext::with_webpki_roots();
        assert!(ctx.config().enable_sni);
    }

    #[test]
    fn pem_without_certificates_is_rejected() {
        let mut pem = &b"-----BEGIN NOTHING-----\nAAAA\n-----END NOTHING-----\n"[..];
        let err = TlsContext::from_pem(&mut pem).unwrap_err();
        assert!(matches!(err, TrustError::NoCertificates));
    }

    #[test]
    fn missing_pem_file_is_io_error() {
        let err = TlsContext::from_pem_file("/nonexistent/roots.pem").unwrap_err();
        assert!(matches!(err, TrustError::Io(_)));
    }
}
