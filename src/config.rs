use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Directory holding one `<job_id>.log` file per job.
    pub log_folder: PathBuf,
    /// Read size in bytes for each chunk served to stream subscribers.
    pub log_chunk_size: usize,
    pub tls: TlsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:50051".parse().unwrap(),
            log_folder: std::env::temp_dir(),
            log_chunk_size: 1024,
            tls: TlsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub enabled: bool,
    /// CA used to verify client certificates.
    pub ca_cert_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Serve plaintext without role checks. Local development only.
    pub allow_insecure: bool,
}

impl TlsConfig {
    /// True when TLS is enabled and every required path is present.
    pub fn is_complete(&self) -> bool {
        self.enabled
            && self.ca_cert_path.is_some()
            && self.cert_path.is_some()
            && self.key_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.log_chunk_size, 1024);
        assert!(!config.tls.enabled);
    }

    #[test]
    fn test_tls_config_is_complete() {
        let mut tls = TlsConfig::default();
        assert!(!tls.is_complete());

        tls.enabled = true;
        tls.ca_cert_path = Some(PathBuf::from("/tmp/ca.crt"));
        tls.cert_path = Some(PathBuf::from("/tmp/server.crt"));
        assert!(!tls.is_complete());

        tls.key_path = Some(PathBuf::from("/tmp/server.key"));
        assert!(tls.is_complete());
    }
}
