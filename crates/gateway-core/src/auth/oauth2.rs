use std::time::{Duration, SystemTime};

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::Authenticator;

/// Tokens are refreshed this long before their declared expiry.
const REFRESH_SKEW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, thiserror::Error)]
pub enum OAuth2Error {
    #[error("token request to {token_url} failed: {reason}")]
    RequestFailed { token_url: String, reason: String },
    #[error("token endpoint {token_url} returned status {status}")]
    NonOkStatus { token_url: String, status: u16 },
    #[error("token endpoint {token_url} returned an unparseable response: {reason}")]
    BadResponse { token_url: String, reason: String },
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

/// Client-credentials OAuth2 authenticator. Maintains one cached token, refreshed
/// single-flight under contention (SPEC_FULL.md §4.C).
pub struct OAuth2Authenticator {
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    scopes: Vec<String>,
    http: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl OAuth2Authenticator {
    pub fn new(token_url: String, client_id: String, client_secret: SecretString, scopes: Vec<String>) -> Self {
        OAuth2Authenticator {
            token_url,
            client_id,
            client_secret,
            scopes,
            http: reqwest::Client::new(),
            token: RwLock::new(None),
        }
    }

    async fn ensure_token(&self) -> Result<String, OAuth2Error> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref()
                && SystemTime::now() < cached.expires_at
            {
                return Ok(cached.access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Re-check: another waiter may have refreshed while we waited for the write lock.
        if let Some(cached) = guard.as_ref()
            && SystemTime::now() < cached.expires_at
        {
            return Ok(cached.access_token.clone());
        }

        let response = self.fetch_token().await?;
        let expires_at = SystemTime::now()
            + Duration::from_secs(response.expires_in.saturating_sub(REFRESH_SKEW.as_secs()));
        let access_token = response.access_token;
        *guard = Some(CachedToken { access_token: access_token.clone(), expires_at });
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<TokenResponse, OAuth2Error> {
        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.expose_secret().to_string()),
        ];
        if !self.scopes.is_empty() {
            form.push(("scope", self.scopes.join(" ")));
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuth2Error::RequestFailed { token_url: self.token_url.clone(), reason: e.to_string() })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(OAuth2Error::NonOkStatus {
                token_url: self.token_url.clone(),
                status: response.status().as_u16(),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuth2Error::BadResponse { token_url: self.token_url.clone(), reason: e.to_string() })
    }
}

#[async_trait::async_trait]
impl Authenticator for OAuth2Authenticator {
    async fn mutate(&self, request: RequestBuilder) -> Result<RequestBuilder, super::AuthError> {
        let token = self.ensure_token().await?;
        Ok(request.bearer_auth(token))
    }

    fn type_tag(&self) -> &'static str {
        "oauth2"
    }
}
