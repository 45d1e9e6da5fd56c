//! CA trust material for outbound TLS.
//!
//! When a CA bundle is configured, the RPS client and LDAPS both trust only
//! the certificates in that bundle. Startup fails if the bundle is unreadable
//! or empty.

use anyhow::{anyhow, Context, Result};
use reqwest::Certificate;
use rustls::{ClientConfig, RootCertStore};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn read_bundle(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read TLS CA bundle: {}", path.display()))
}

/// Load every PEM certificate from a CA bundle.
///
/// # Errors
/// Returns an error if the bundle cannot be read, parsed, or holds no certificate.
pub fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let pem = read_bundle(path)?;
    let certs = Certificate::from_pem_bundle(&pem)
        .with_context(|| format!("Failed to parse TLS CA bundle: {}", path.display()))?;
    if certs.is_empty() {
        return Err(anyhow!("TLS CA bundle is empty: {}", path.display()));
    }
    Ok(certs)
}

/// Client TLS config for LDAPS whose only roots are the bundle's certificates.
///
/// # Errors
/// Returns an error if the bundle cannot be read, holds no certificate, or a
/// certificate is rejected as a trust anchor.
pub fn load_ldap_tls_config(path: &Path) -> Result<Arc<ClientConfig>> {
    let pem = read_bundle(path)?;
    let ders = rustls_pemfile::certs(&mut pem.as_slice())
        .with_context(|| format!("Failed to parse TLS CA bundle: {}", path.display()))?;
    if ders.is_empty() {
        return Err(anyhow!("TLS CA bundle is empty: {}", path.display()));
    }

    let mut roots = RootCertStore::empty();
    for der in ders {
        roots
            .add(&rustls::Certificate(der))
            .with_context(|| format!("Invalid CA certificate in {}", path.display()))?;
    }

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rpa-tls-test-{label}-{}", Uuid::new_v4()))
    }

    #[test]
    fn load_ca_bundle_missing_fails() {
        let path = temp_path("missing");
        let err = load_ca_bundle(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to read TLS CA bundle"));
    }

    #[test]
    fn load_ca_bundle_without_certificates_fails() {
        let path = temp_path("empty");
        fs::write(&path, "no certificates here\n").unwrap();
        let result = load_ca_bundle(&path);
        let ldap = load_ldap_tls_config(&path);
        let _ = fs::remove_file(&path);
        assert!(result.is_err());
        assert!(ldap
            .unwrap_err()
            .to_string()
            .contains("TLS CA bundle is empty"));
    }

    #[test]
    fn load_ldap_tls_config_missing_fails() {
        let err = load_ldap_tls_config(&temp_path("ldap-missing")).unwrap_err();
        assert!(err.to_string().contains("Failed to read TLS CA bundle"));
    }
}
