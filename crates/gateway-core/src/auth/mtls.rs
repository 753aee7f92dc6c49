use std::path::Path;
use std::sync::Arc;

use reqwest::RequestBuilder;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use super::{AuthError, Authenticator};

/// mTLS authenticator. `mutate` is a marker — the actual credential is the TLS
/// configuration exposed via [`Authenticator::tls_config`], which the Executor installs on
/// the connector's HTTP client transport before the first send.
pub struct MtlsAuthenticator {
    tls_config: Arc<rustls::ClientConfig>,
}

impl MtlsAuthenticator {
    pub fn load(cert_path: &Path, key_path: &Path, ca_cert_path: Option<&str>) -> Result<Self, AuthError> {
        let certs = load_cert_chain(cert_path)?;
        let key = load_private_key(key_path)?;

        let root_store = load_ca_pool(ca_cert_path);

        let builder = rustls::ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
            .with_root_certificates(root_store);

        let config = builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| AuthError::Io(format!("building TLS config: {e}")))?;

        Ok(MtlsAuthenticator { tls_config: Arc::new(config) })
    }
}

#[async_trait::async_trait]
impl Authenticator for MtlsAuthenticator {
    async fn mutate(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthError> {
        Ok(request)
    }

    fn type_tag(&self) -> &'static str {
        "mtls"
    }

    fn tls_config(&self) -> Option<Arc<rustls::ClientConfig>> {
        Some(self.tls_config.clone())
    }
}

fn load_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>, AuthError> {
    let raw = std::fs::read(path)
        .map_err(|e| AuthError::Io(format!("reading certificate {}: {e}", path.display())))?;
    rustls_pemfile::certs(&mut raw.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AuthError::Io(format!("parsing certificate {}: {e}", path.display())))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, AuthError> {
    let raw = std::fs::read(path)
        .map_err(|e| AuthError::Io(format!("reading key {}: {e}", path.display())))?;
    rustls_pemfile::private_key(&mut raw.as_slice())
        .map_err(|e| AuthError::Io(format!("parsing key {}: {e}", path.display())))?
        .ok_or_else(|| AuthError::Io(format!("no private key found in {}", path.display())))
}

/// Loads the configured custom CA pool, falling back to the system pool with a warning (not
/// a hard failure) if the custom file fails to load.
fn load_ca_pool(ca_cert_path: Option<&str>) -> rustls::RootCertStore {
    if let Some(path) = ca_cert_path {
        match std::fs::read(path) {
            Ok(raw) => {
                let mut store = rustls::RootCertStore::empty();
                let mut added = 0usize;
                for cert in rustls_pemfile::certs(&mut raw.as_slice()).flatten() {
                    if store.add(cert).is_ok() {
                        added += 1;
                    }
                }
                if added > 0 {
                    return store;
                }
                tracing::warn!(path, "custom CA file contained no usable certificates, falling back to system pool");
            }
            Err(error) => {
                tracing::warn!(path, %error, "failed to load custom CA file, falling back to system pool");
            }
        }
    }
    system_root_store()
}

fn system_root_store() -> rustls::RootCertStore {
    let mut store = rustls::RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs().certs {
        let _ = store.add(cert);
    }
    store
}
