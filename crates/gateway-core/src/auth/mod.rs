//! Auth Engine (SPEC_FULL.md §4.C): a pure factory that turns an [`AuthSpec`] plus the
//! secret/certificate providers into an [`Authenticator`].

mod mtls;
mod oauth2;

pub use mtls::MtlsAuthenticator;
pub use oauth2::{OAuth2Authenticator, OAuth2Error};

use std::sync::Arc;

use reqwest::RequestBuilder;

use crate::certs::{CertificateError, CertificateProvider};
use crate::secrets::{SecretError, SecretProvider};
use crate::types::AuthSpec;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("secret resolution failed: {0}")]
    Secret(#[from] SecretError),
    #[error("certificate resolution failed: {0}")]
    Certificate(#[from] CertificateError),
    #[error("auth kind not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("oauth2 token fetch failed: {0}")]
    OAuth2(#[from] OAuth2Error),
    #[error("mtls setup failed: {0}")]
    Io(String),
}

/// An authenticator attaches credentials to an outgoing request. mTLS authenticators
/// additionally expose a TLS configuration the HTTP client must install on its transport
/// before the first send (SPEC_FULL.md §4.C, §4.F).
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// Mutates `request` in place, attaching whatever credentials this variant carries.
    async fn mutate(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthError>;

    fn type_tag(&self) -> &'static str;

    /// Present only for the mTLS variant; other authenticators return `None`.
    fn tls_config(&self) -> Option<Arc<rustls::ClientConfig>> {
        None
    }
}

struct NoneAuthenticator;

#[async_trait::async_trait]
impl Authenticator for NoneAuthenticator {
    async fn mutate(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthError> {
        Ok(request)
    }

    fn type_tag(&self) -> &'static str {
        "none"
    }
}

struct ApiKeyAuthenticator {
    header_name: String,
    api_key: secrecy::SecretString,
}

#[async_trait::async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn mutate(&self, request: RequestBuilder) -> Result<RequestBuilder, AuthError> {
        use secrecy::ExposeSecret;
        Ok(request.header(&self.header_name, self.api_key.expose_secret()))
    }

    fn type_tag(&self) -> &'static str {
        "api_key"
    }
}

/// Builds the [`Authenticator`] for a connector's [`AuthSpec`] (SPEC_FULL.md §4.C).
pub struct AuthEngine {
    secrets: Arc<dyn SecretProvider>,
    certificates: Arc<dyn CertificateProvider>,
}

impl AuthEngine {
    pub fn new(secrets: Arc<dyn SecretProvider>, certificates: Arc<dyn CertificateProvider>) -> Self {
        AuthEngine { secrets, certificates }
    }

    pub fn build(&self, spec: &AuthSpec) -> Result<Arc<dyn Authenticator>, AuthError> {
        match spec {
            AuthSpec::None => Ok(Arc::new(NoneAuthenticator)),
            AuthSpec::ApiKey { header_name, key_ref } => {
                let api_key = self.secrets.get_secret(key_ref)?;
                Ok(Arc::new(ApiKeyAuthenticator { header_name: header_name.clone(), api_key }))
            }
            AuthSpec::OAuth2 { token_url, client_id, client_secret_ref, scopes } => {
                let client_secret = self.secrets.get_secret(client_secret_ref)?;
                Ok(Arc::new(OAuth2Authenticator::new(
                    token_url.clone(),
                    client_id.clone(),
                    client_secret,
                    scopes.clone(),
                )))
            }
            AuthSpec::Mtls { certificate_ref, ca_cert_path } => {
                let (cert_path, key_path) = self.certificates.get_certificate(certificate_ref)?;
                Ok(Arc::new(MtlsAuthenticator::load(&cert_path, &key_path, ca_cert_path.as_deref())?))
            }
            AuthSpec::Basic { .. } => Err(AuthError::NotImplemented("basic")),
            AuthSpec::Jwt { .. } => Err(AuthError::NotImplemented("jwt")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::FileCertificateProvider;
    use crate::secrets::EnvSecretProvider;

    fn engine() -> AuthEngine {
        AuthEngine::new(Arc::new(EnvSecretProvider::new()), Arc::new(FileCertificateProvider::new(".")))
    }

    #[tokio::test]
    async fn none_is_a_no_op() {
        let authenticator = engine().build(&AuthSpec::None).unwrap();
        assert_eq!(authenticator.type_tag(), "none");
    }

    #[tokio::test]
    async fn api_key_sets_header() {
        unsafe { std::env::set_var("SECRET_DEMO", "shh") };
        let spec = AuthSpec::ApiKey { header_name: "X-API-Key".to_string(), key_ref: "demo".to_string() };
        let authenticator = engine().build(&spec).unwrap();
        let client = reqwest::Client::new();
        let request = authenticator
            .mutate(client.get("https://example.test"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers().get("X-API-Key").unwrap(), "shh");
        unsafe { std::env::remove_var("SECRET_DEMO") };
    }

    #[tokio::test]
    async fn reserved_kinds_fail_cleanly() {
        let err = engine().build(&AuthSpec::Basic { username_ref: None, password_ref: None }).unwrap_err();
        assert_matches::assert_matches!(err, AuthError::NotImplemented("basic"));
    }
}
