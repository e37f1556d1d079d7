//! HTTPS server configuration from PEM files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::info;

fn load_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("failed to open certificate {}", path.display()))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificate {}", path.display()))?;
    anyhow::ensure!(!certs.is_empty(), "no certificates found in {}", path.display());
    Ok(certs)
}

fn load_key(path: &Path) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("failed to open private key {}", path.display()))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("failed to parse private key {}", path.display()))?
        .with_context(|| format!("no private key found in {}", path.display()))
}

/// Build a rustls server config offering HTTP/1.1.
pub fn server_config(cert: &Path, key: &Path) -> anyhow::Result<Arc<ServerConfig>> {
    let certs = load_certs(cert)?;
    let key = load_key(key)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("unsupported TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("certificate and key do not match")?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    info!(cert = %cert.display(), "TLS certificate loaded");
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn write_self_signed(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let key_pair = KeyPair::generate().unwrap();
        let params = CertificateParams::new(vec!["spale.default.svc".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("cert.key");
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();
        (cert_path, key_path)
    }

    #[test]
    fn loads_matching_pem_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_self_signed(dir.path());
        let config = server_config(&cert, &key).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = server_config(&dir.path().join("cert.pem"), &dir.path().join("cert.key")).unwrap_err();
        assert!(err.to_string().contains("failed to open certificate"));
    }

    #[test]
    fn empty_pem_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, _) = write_self_signed(dir.path());
        let empty = dir.path().join("empty.pem");
        std::fs::write(&empty, "").unwrap();

        let err = server_config(&empty, &empty).unwrap_err();
        assert!(err.to_string().contains("no certificates"));

        let err = server_config(&cert, &empty).unwrap_err();
        assert!(err.to_string().contains("no private key"));
    }
}
