//! Certificate provider (SPEC_FULL.md §4.B): resolves opaque references to cert/key file
//! pairs on disk.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate missing for ref {0}")]
    CertificateMissing(String),
}

/// `certificates.get(ref) -> (cert_path, key_path) | NotFound`.
pub trait CertificateProvider: Send + Sync {
    fn get_certificate(&self, reference: &str) -> Result<(PathBuf, PathBuf), CertificateError>;
}

/// File-pair certificate provider: `<certs_dir>/<ref>.pem` and `.key`.
#[derive(Debug, Clone)]
pub struct FileCertificateProvider {
    certs_dir: PathBuf,
}

impl FileCertificateProvider {
    pub fn new(certs_dir: impl Into<PathBuf>) -> Self {
        FileCertificateProvider { certs_dir: certs_dir.into() }
    }
}

impl CertificateProvider for FileCertificateProvider {
    fn get_certificate(&self, reference: &str) -> Result<(PathBuf, PathBuf), CertificateError> {
        let cert_path = self.certs_dir.join(format!("{reference}.pem"));
        let key_path = self.certs_dir.join(format!("{reference}.key"));
        if !cert_path.is_file() || !key_path.is_file() {
            return Err(CertificateError::CertificateMissing(reference.to_string()));
        }
        Ok((cert_path, key_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pair_errors() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileCertificateProvider::new(dir.path());
        assert_matches::assert_matches!(provider.get_certificate("acme"), Err(CertificateError::CertificateMissing(_)));
    }

    #[test]
    fn resolves_existing_pair() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("acme.pem"), "cert").unwrap();
        std::fs::write(dir.path().join("acme.key"), "key").unwrap();
        let provider = FileCertificateProvider::new(dir.path());
        let (cert, key) = provider.get_certificate("acme").unwrap();
        assert!(cert.is_file());
        assert!(key.is_file());
    }
}
