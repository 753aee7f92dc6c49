//! The resilient HTTP client itself (SPEC_FULL.md §4.E), grounded on `HTTPClient.Do` /
//! `doWithRetry` in the original's `httpclient.go`: rate limit, then circuit breaker wrapping
//! retry-with-backoff.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Request, Response};

use super::circuit_breaker::CircuitBreaker;
use super::retry::{calculate_backoff, is_retryable_status};
use super::token_bucket::TokenBucket;
use super::{ResilienceError, parse_duration};
use crate::metrics::{ConnectorLabels, Metrics};
use crate::types::{BackoffKind, ResilienceSpec};

/// Wraps a plain [`reqwest::Client`] with the resilience layers an endpoint's
/// [`ResilienceSpec`] opts into. All layers are optional — an endpoint with no resilience
/// block just forwards to `client.execute`.
pub struct ResilientHttpClient {
    connector_id: String,
    client: Client,
    rate_limiter: Option<TokenBucket>,
    circuit_breaker: Option<CircuitBreaker>,
    max_attempts: u32,
    backoff: BackoffKind,
    initial_interval: Duration,
    max_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl ResilientHttpClient {
    /// Builds the resilience layers from `spec`. `client` should be a pooled client shared
    /// across every request this connector sends, so keep-alive connections and circuit
    /// breaker / rate limiter state both survive across calls — construct one per connector,
    /// not one per request.
    pub fn new(connector_id: impl Into<String>, client: Client, spec: &ResilienceSpec, metrics: Option<Arc<Metrics>>) -> Self {
        let rate_limiter = spec.rate_limit.as_ref().map(TokenBucket::new);
        let circuit_breaker = spec.circuit_breaker.as_ref().map(|cb| {
            let timeout = parse_duration(&cb.timeout);
            CircuitBreaker::new(cb, timeout)
        });

        let (max_attempts, backoff, initial_interval, max_interval) = match &spec.retry {
            Some(retry) => (
                retry.max_attempts.max(1),
                retry.backoff,
                parse_duration(&retry.initial_interval),
                parse_duration(&retry.max_interval),
            ),
            None => (1, BackoffKind::Constant, Duration::ZERO, Duration::ZERO),
        };

        ResilientHttpClient {
            connector_id: connector_id.into(),
            client,
            rate_limiter,
            circuit_breaker,
            max_attempts,
            backoff,
            initial_interval,
            max_interval,
            metrics,
        }
    }

    fn connector_labels(&self) -> ConnectorLabels {
        ConnectorLabels { connector: self.connector_id.clone() }
    }

    /// Sends `request`, applying rate limiting, circuit breaking, and retry-with-backoff in
    /// that order, bounding the whole attempt (including waiting for a rate-limit token and
    /// the retries) by `timeout`. The request must be cloneable (no streaming body) to
    /// support retries.
    pub async fn send(&self, request: Request, timeout: Duration) -> Result<Response, ResilienceError> {
        let attempt = async {
            if let Some(limiter) = &self.rate_limiter
                && !limiter.acquire(timeout).await
            {
                if let Some(metrics) = &self.metrics {
                    metrics.rate_limiter_rejections.get_or_create(&self.connector_labels()).inc();
                }
                return Err(ResilienceError::RateLimitExhausted);
            }

            if let Some(breaker) = &self.circuit_breaker {
                if !breaker.admit() {
                    if let Some(metrics) = &self.metrics {
                        metrics.circuit_breaker_rejections.get_or_create(&self.connector_labels()).inc();
                    }
                    return Err(ResilienceError::CircuitOpen);
                }
                let result = self.send_with_retry(request).await;
                match &result {
                    Ok(response) if !is_retryable_status(response.status().as_u16()) => breaker.on_success(),
                    _ => breaker.on_failure(),
                }
                result
            } else {
                self.send_with_retry(request).await
            }
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ResilienceError::Timeout),
        }
    }

    async fn send_with_retry(&self, request: Request) -> Result<Response, ResilienceError> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let Some(attempt_request) = request.try_clone() else {
                return self
                    .client
                    .execute(request)
                    .await
                    .map_err(|e| ResilienceError::Transport(e.to_string()));
            };

            match self.client.execute(attempt_request).await {
                Ok(response) if !is_retryable_status(response.status().as_u16()) => return Ok(response),
                Ok(response) => last_error = Some(ResilienceError::Transport(format!("server error: {}", response.status()))),
                Err(error) => last_error = Some(ResilienceError::Transport(error.to_string())),
            }

            if attempt == self.max_attempts {
                break;
            }

            let wait = calculate_backoff(self.backoff, attempt, self.initial_interval, self.max_interval);
            tokio::time::sleep(wait).await;
        }

        Err(last_error.unwrap_or(ResilienceError::Transport("max retries exceeded".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CircuitBreakerSpec, RateLimitSpec, RetrySpec};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resilience_spec() -> ResilienceSpec {
        ResilienceSpec {
            retry: Some(RetrySpec {
                max_attempts: 3,
                backoff: crate::types::BackoffKind::Constant,
                initial_interval: "1ms".to_string(),
                max_interval: "10ms".to_string(),
            }),
            circuit_breaker: None,
            rate_limit: None,
        }
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = ResilientHttpClient::new("demo", Client::new(), &resilience_spec(), None);
        let request = Client::new().get(server.uri()).build().unwrap();
        let response = client.send(request, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).expect(1).mount(&server).await;

        let client = ResilientHttpClient::new("demo", Client::new(), &resilience_spec(), None);
        let request = Client::new().get(server.uri()).build().unwrap();
        let response = client.send(request, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_fails_once_deadline_elapses() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let mut spec = resilience_spec();
        // 6 requests/minute refills one token every 10s, so a 50ms deadline can't catch it.
        spec.rate_limit = Some(RateLimitSpec { requests_per_minute: 6, burst: Some(1) });
        let client = ResilientHttpClient::new("demo", Client::new(), &spec, None);

        let first = Client::new().get(server.uri()).build().unwrap();
        client.send(first, Duration::from_secs(5)).await.unwrap();

        let second = Client::new().get(server.uri()).build().unwrap();
        let result = client.send(second, Duration::from_millis(50)).await;
        assert_matches::assert_matches!(result, Err(ResilienceError::RateLimitExhausted));
    }

    #[tokio::test]
    async fn rate_limiter_waits_for_a_token_instead_of_rejecting_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let mut spec = resilience_spec();
        // One token/sec refill: the second call must wait, not fail, within a 5s deadline.
        spec.rate_limit = Some(RateLimitSpec { requests_per_minute: 60, burst: Some(1) });
        let client = ResilientHttpClient::new("demo", Client::new(), &spec, None);

        let first = Client::new().get(server.uri()).build().unwrap();
        client.send(first, Duration::from_secs(5)).await.unwrap();

        let second = Client::new().get(server.uri()).build().unwrap();
        let response = client.send(second, Duration::from_secs(5)).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn open_circuit_breaker_rejects_without_sending() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let mut spec = resilience_spec();
        spec.retry = Some(RetrySpec {
            max_attempts: 1,
            backoff: crate::types::BackoffKind::Constant,
            initial_interval: "1ms".to_string(),
            max_interval: "1ms".to_string(),
        });
        spec.circuit_breaker = Some(CircuitBreakerSpec { failure_threshold: 0.6, success_threshold: 1, timeout: "1h".to_string() });
        let client = ResilientHttpClient::new("demo", Client::new(), &spec, None);

        for _ in 0..3 {
            let request = Client::new().get(server.uri()).build().unwrap();
            let _ = client.send(request, Duration::from_secs(5)).await;
        }

        let request = Client::new().get(server.uri()).build().unwrap();
        let result = client.send(request, Duration::from_secs(5)).await;
        assert_matches::assert_matches!(result, Err(ResilienceError::CircuitOpen));
    }

    #[tokio::test]
    async fn rejections_are_counted_by_connector() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let mut spec = resilience_spec();
        spec.retry = Some(RetrySpec {
            max_attempts: 1,
            backoff: crate::types::BackoffKind::Constant,
            initial_interval: "1ms".to_string(),
            max_interval: "1ms".to_string(),
        });
        spec.circuit_breaker = Some(CircuitBreakerSpec { failure_threshold: 0.6, success_threshold: 1, timeout: "1h".to_string() });
        let metrics = std::sync::Arc::new(crate::metrics::Metrics::default());
        let client = ResilientHttpClient::new("demo", Client::new(), &spec, Some(metrics.clone()));

        for _ in 0..4 {
            let request = Client::new().get(server.uri()).build().unwrap();
            let _ = client.send(request, Duration::from_secs(5)).await;
        }

        let rejections = metrics.circuit_breaker_rejections.get_or_create(&crate::metrics::ConnectorLabels { connector: "demo".to_string() }).get();
        assert_eq!(rejections, 1);
    }
}
