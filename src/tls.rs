//! TLS configuration of the listener.

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{SecureServeError, SecureServeResult};

/// Builds the rustls configuration of the listener from PEM files.
pub fn server_config(cert_file: &Path, key_file: &Path) -> SecureServeResult<Arc<rustls::ServerConfig>> {
    let certs = load_certs(cert_file)?;
    let private_key = load_private_key(key_file)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut cfg = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, private_key)?;
    cfg.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Arc::new(cfg))
}

/// Load public certificate from file
fn load_certs(filename: &Path) -> SecureServeResult<Vec<CertificateDer<'static>>> {
    let pem = read(filename)?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_err(filename, format!("failed to load certificate: {}", e)))?;
    if certs.is_empty() {
        return Err(tls_err(filename, "no certificate found".to_string()));
    }
    Ok(certs)
}

/// Load private key from file, either PKCS#1 or PKCS#8 encoded
fn load_private_key(filename: &Path) -> SecureServeResult<PrivateKeyDer<'static>> {
    let pem = read(filename)?;
    PrivateKeyDer::from_pem_slice(&pem)
        .map_err(|e| tls_err(filename, format!("failed to load private key: {}", e)))
}

fn read(filename: &Path) -> SecureServeResult<Vec<u8>> {
    std::fs::read(filename).map_err(|e| tls_err(filename, format!("failed to open: {}", e)))
}

fn tls_err(path: &Path, message: String) -> SecureServeError {
    SecureServeError::TlsMaterial {
        path: path.to_path_buf(),
        message,
    }
}
