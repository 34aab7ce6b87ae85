//! Certificate loading for the mutually authenticated endpoint.
//!
//! The server presents its own identity and requires clients to present a
//! certificate signed by the configured CA; client roles are carried in a
//! certificate extension read by [`crate::auth`].

use std::path::PathBuf;

use tokio::fs;
use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};

use crate::config::TlsConfig;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("TLS {0} path not configured")]
    MissingPath(&'static str),

    #[error("TLS file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read TLS file: {0}")]
    Io(#[from] std::io::Error),
}

/// Loaded TLS materials ready for use with tonic: this endpoint's
/// certificate and key, plus the CA that peer certificates must chain to.
#[derive(Clone)]
pub struct TlsIdentity {
    identity: Identity,
    ca_cert: Certificate,
}

impl TlsIdentity {
    /// Load certificate, key and CA from the paths in `config`.
    pub async fn load(config: &TlsConfig) -> Result<Self, TlsError> {
        let ca_path = required(&config.ca_cert_path, "CA certificate")?;
        let cert_path = required(&config.cert_path, "certificate")?;
        let key_path = required(&config.key_path, "private key")?;

        let ca_pem = fs::read(ca_path).await?;
        let cert_pem = fs::read(cert_path).await?;
        let key_pem = fs::read(key_path).await?;

        Ok(Self {
            identity: Identity::from_pem(cert_pem, key_pem),
            ca_cert: Certificate::from_pem(ca_pem),
        })
    }

    /// Server-side config: present our identity, require a client
    /// certificate and verify it against the CA.
    pub fn server_tls_config(&self) -> ServerTlsConfig {
        ServerTlsConfig::new()
            .identity(self.identity.clone())
            .client_ca_root(self.ca_cert.clone())
    }

    /// Client-side config for `domain`: present our identity and verify
    /// the server against the CA.
    pub fn client_tls_config(&self, domain: &str) -> ClientTlsConfig {
        ClientTlsConfig::new()
            .domain_name(domain)
            .ca_certificate(self.ca_cert.clone())
            .identity(self.identity.clone())
    }
}

fn required<'a>(
    path: &'a Option<PathBuf>,
    what: &'static str,
) -> Result<&'a PathBuf, TlsError> {
    let path = path.as_ref().ok_or(TlsError::MissingPath(what))?;
    if !path.exists() {
        return Err(TlsError::FileNotFound(path.clone()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_paths() {
        let config = TlsConfig {
            enabled: true,
            ca_cert_path: None,
            cert_path: None,
            key_path: None,
            allow_insecure: false,
        };

        let result = TlsIdentity::load(&config).await;
        assert!(matches!(result, Err(TlsError::MissingPath(_))));
    }

    #[tokio::test]
    async fn test_load_nonexistent_files() {
        let config = TlsConfig {
            enabled: true,
            ca_cert_path: Some(PathBuf::from("/nonexistent/ca.crt")),
            cert_path: Some(PathBuf::from("/nonexistent/server.crt")),
            key_path: Some(PathBuf::from("/nonexistent/server.key")),
            allow_insecure: false,
        };

        let result = TlsIdentity::load(&config).await;
        assert!(matches!(result, Err(TlsError::FileNotFound(_))));
    }
}
