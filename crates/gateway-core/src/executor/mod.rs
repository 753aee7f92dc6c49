//! Executor (SPEC_FULL.md §4.F): orchestrates registry lookup, auth, request construction,
//! resilient dispatch, and response transform for a single connector call. Grounded on the
//! original's `internal/framework/executor.go`.

mod request;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use reqwest::Client;
use tokio::sync::RwLock;

use crate::auth::{AuthEngine, Authenticator};
use crate::cache::CacheManager;
use crate::error::GatewayError;
use crate::metrics::{ExecutorLabels, Metrics};
use crate::registry::Registry;
use crate::resilience::{ResilientHttpClient, parse_duration, retry_after_hint};
use crate::transform::TransformEngine;
use crate::types::{CacheSpec, Connector, ExecutionContext, ExecutionResult, IntegrationType};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// A connector's authenticator and pooled resilient HTTP client, built once and reused
/// across every call so OAuth2 token caching, keep-alive pooling, and circuit breaker /
/// rate limiter state all persist across requests instead of resetting each time
/// (SPEC_FULL.md §4.E, §4.F).
struct ConnectorClient {
    authenticator: Arc<dyn Authenticator>,
    resilient: ResilientHttpClient,
}

/// Orchestrates one connector call end to end (SPEC_FULL.md §4.F, steps 1-16 of the
/// original's `Execute`).
pub struct Executor {
    registry: Arc<Registry>,
    auth_engine: Arc<AuthEngine>,
    transformer: Arc<TransformEngine>,
    cache: Option<Arc<CacheManager>>,
    metrics: Option<Arc<Metrics>>,
    clients: RwLock<HashMap<String, Arc<ConnectorClient>>>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>, auth_engine: Arc<AuthEngine>, transformer: Arc<TransformEngine>) -> Self {
        Executor { registry, auth_engine, transformer, cache: None, metrics: None, clients: RwLock::new(HashMap::new()) }
    }

    /// Fronts the Executor with a cache manager, consulted before dispatch and populated
    /// after a successful response whenever the connector opts in via `integration.cache`
    /// (SPEC_FULL.md §4.G).
    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn execute(&self, ctx: &ExecutionContext) -> Result<ExecutionResult, GatewayError> {
        let started = Instant::now();
        let span = tracing::info_span!(
            "execute",
            connector = %ctx.connector_id,
            endpoint = %ctx.endpoint_name,
            environment = %ctx.environment,
        );
        let _entered = span.enter();
        tracing::info!("executing connector request");

        let result = self.execute_inner(ctx, started).await;

        let duration = started.elapsed();
        if let Some(metrics) = &self.metrics {
            let outcome = if result.is_ok() { "success" } else { "error" };
            let labels = ExecutorLabels {
                connector: ctx.connector_id.clone(),
                endpoint: ctx.endpoint_name.clone(),
                outcome: outcome.to_string(),
            };
            metrics.executor_requests.get_or_create(&labels).inc();
            metrics.executor_latency.get_or_create(&labels).observe(duration.as_secs_f64());
        }

        match &result {
            Ok(outcome) => {
                tracing::info!(status_code = outcome.status_code, duration_ms = outcome.duration_ms, "request completed successfully");
            }
            Err(error) => {
                tracing::warn!(error = %error, duration_ms = duration.as_secs_f64() * 1000.0, "request failed");
            }
        }
        result
    }

    /// Returns the connector's cached authenticator/client, building and inserting one under
    /// double-checked locking on first use (mirrors the single-flight idiom the OAuth2
    /// authenticator itself uses for token refresh).
    async fn connector_client(&self, connector: &Connector) -> Result<Arc<ConnectorClient>, GatewayError> {
        if let Some(existing) = self.clients.read().await.get(&connector.id) {
            return Ok(existing.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(existing) = clients.get(&connector.id) {
            return Ok(existing.clone());
        }

        let authenticator = self.auth_engine.build(&connector.integration.auth)?;

        let mut builder = Client::builder().pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST).pool_idle_timeout(POOL_IDLE_TIMEOUT);
        if let Some(tls_config) = authenticator.tls_config() {
            builder = builder.use_preconfigured_tls((*tls_config).clone());
        }
        let client = builder.build().map_err(|e| GatewayError::InvalidParams(e.to_string()))?;
        let resilient = ResilientHttpClient::new(&connector.id, client, &connector.integration.resilience, self.metrics.clone());

        let entry = Arc::new(ConnectorClient { authenticator, resilient });
        clients.insert(connector.id.clone(), entry.clone());
        Ok(entry)
    }

    fn cache_key(connector_id: &str, endpoint_name: &str, spec: &CacheSpec, ctx: &ExecutionContext) -> String {
        match &spec.key_pattern {
            Some(pattern) => {
                let mut key = pattern.clone();
                for (name, value) in &ctx.params {
                    key = key.replace(&format!("{{{{{name}}}}}"), &request::value_to_string(value));
                }
                key
            }
            None => {
                let mut sorted: Vec<_> = ctx.params.iter().collect();
                sorted.sort_by(|a, b| a.0.cmp(b.0));
                let params = sorted.into_iter().map(|(k, v)| format!("{k}={}", request::value_to_string(v))).collect::<Vec<_>>().join("&");
                format!("{connector_id}:{endpoint_name}:{params}")
            }
        }
    }

    async fn execute_inner(&self, ctx: &ExecutionContext, started: Instant) -> Result<ExecutionResult, GatewayError> {
        let connector = self.registry.get(&ctx.connector_id)?;

        if connector.integration.kind != IntegrationType::RestApi {
            return Err(GatewayError::InvalidParams(format!(
                "integration type {:?} is not executable",
                connector.integration.kind
            )));
        }

        let endpoint = self.registry.get_endpoint(&ctx.connector_id, &ctx.endpoint_name)?;
        let environment = self.registry.get_environment(&ctx.connector_id, &ctx.environment)?;

        let cache_spec = connector.integration.cache.as_ref().filter(|spec| spec.enabled);
        let cache_key = cache_spec.map(|spec| Self::cache_key(&connector.id, &ctx.endpoint_name, spec, ctx));

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let (Some(data), _level) = cache.get(key).await
        {
            return Ok(ExecutionResult { data, status_code: 200, duration_ms: started.elapsed().as_secs_f64() * 1000.0 });
        }

        let connector_client = self.connector_client(&connector).await?;

        let url = request::build_url(&environment.base_url, &endpoint.path, &ctx.params);
        let builder = request::build_request(&url, &endpoint, &ctx.params)?;
        let builder = connector_client.authenticator.mutate(builder).await?;
        let http_request = builder.build().map_err(|e| GatewayError::InvalidParams(e.to_string()))?;

        let timeout = endpoint
            .timeout
            .as_deref()
            .map(parse_duration)
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT);

        let response = connector_client.resilient.send(http_request, timeout).await?;

        let status = response.status().as_u16();
        let retry_after = retry_after_hint(response.headers(), SystemTime::now()).map(|d| d.as_secs());
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::UpstreamError { status, body_excerpt: e.to_string(), retry_after_secs: None })?;

        if !endpoint.response.success_status.contains(&status) {
            let excerpt: String = String::from_utf8_lossy(&body).chars().take(500).collect();
            return Err(GatewayError::UpstreamError { status, body_excerpt: excerpt, retry_after_secs: retry_after });
        }

        let data = self.transformer.transform(&body, &endpoint.response)?;

        if let (Some(cache), Some(key), Some(spec)) = (&self.cache, &cache_key, cache_spec) {
            let ttl = spec.ttl.as_deref().map(parse_duration).filter(|d| !d.is_zero());
            if let Err(errors) = cache.set(key, data.clone(), ttl).await {
                tracing::warn!(key, ?errors, "cache write failed on one or more levels");
            }
        }

        Ok(ExecutionResult { data, status_code: status, duration_ms: started.elapsed().as_secs_f64() * 1000.0 })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::cache::CacheManagerConfig;
    use crate::certs::FileCertificateProvider;
    use crate::registry::Registry;
    use crate::secrets::EnvSecretProvider;
    use crate::types::{
        AuthSpec, BodySpec, CircuitBreakerSpec, Connector, EndpointSpec, Environment, HttpMethod, IntegrationSpec,
        IntegrationType, ParameterSpec, ResilienceSpec, ResponseSpec, RetrySpec,
    };

    fn connector(base_url: &str, auth: AuthSpec, resilience: ResilienceSpec) -> Connector {
        let mut environments = HashMap::new();
        environments.insert("production".to_string(), Environment { base_url: base_url.to_string(), health_check: None });

        let mut endpoints = HashMap::new();
        endpoints.insert(
            "lookup".to_string(),
            EndpointSpec {
                method: HttpMethod::Get,
                path: "/lookup/{id}".to_string(),
                path_params: vec![ParameterSpec {
                    name: "id".to_string(),
                    kind: None,
                    required: true,
                    format: None,
                    pattern: None,
                    min_length: None,
                    max_length: None,
                    default: None,
                }],
                query_params: vec![],
                headers: HashMap::new(),
                body: None::<BodySpec>,
                timeout: None,
                response: ResponseSpec {
                    success_status: vec![200],
                    error_status: vec![],
                    mapping: HashMap::from([("city".to_string(), "$.city".to_string())]),
                    transforms: vec![],
                },
            },
        );

        Connector {
            id: "demo".to_string(),
            name: "Demo".to_string(),
            version: "1.0.0".to_string(),
            provider: "demo-provider".to_string(),
            integration: IntegrationSpec { kind: IntegrationType::RestApi, auth, endpoints, resilience, cache: None },
            environments,
            compliance: None,
            governance: None,
            observability: None,
        }
    }

    fn executor(registry: Registry) -> Executor {
        let auth_engine = Arc::new(AuthEngine::new(Arc::new(EnvSecretProvider::new()), Arc::new(FileCertificateProvider::new("."))));
        Executor::new(Arc::new(registry), auth_engine, Arc::new(TransformEngine::default()))
    }

    fn ctx(id: &str) -> ExecutionContext {
        let mut params = HashMap::new();
        params.insert("id".to_string(), json!(id));
        ExecutionContext {
            connector_id: "demo".to_string(),
            endpoint_name: "lookup".to_string(),
            environment: "production".to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn executes_unauthenticated_lookup_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lookup/01310100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"city": "Sao Paulo"})))
            .mount(&server)
            .await;

        let registry = Registry::new("./nonexistent");
        registry.insert_for_test(connector(&server.uri(), AuthSpec::None, ResilienceSpec::default()));

        let executor = executor(registry);
        let result = executor.execute(&ctx("01310100")).await.unwrap();
        assert_eq!(result.status_code, 200);
        assert_eq!(result.data, json!({"city": "Sao Paulo"}));
    }

    #[tokio::test]
    async fn reuses_the_same_connector_client_across_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true}))).mount(&server).await;

        let registry = Registry::new("./nonexistent");
        registry.insert_for_test(connector(&server.uri(), AuthSpec::None, ResilienceSpec::default()));

        let executor = executor(registry);
        executor.execute(&ctx("1")).await.unwrap();
        executor.execute(&ctx("2")).await.unwrap();

        assert_eq!(executor.clients.read().await.len(), 1);
    }

    #[tokio::test]
    async fn circuit_breaker_trips_after_repeated_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let resilience = ResilienceSpec {
            retry: Some(RetrySpec { max_attempts: 1, backoff: crate::types::BackoffKind::Constant, initial_interval: "1ms".to_string(), max_interval: "1ms".to_string() }),
            circuit_breaker: Some(CircuitBreakerSpec { failure_threshold: 0.6, success_threshold: 1, timeout: "1h".to_string() }),
            rate_limit: None,
        };

        let registry = Registry::new("./nonexistent");
        registry.insert_for_test(connector(&server.uri(), AuthSpec::None, resilience));

        let executor = executor(registry);
        for _ in 0..3 {
            let _ = executor.execute(&ctx("1")).await;
        }

        let result = executor.execute(&ctx("1")).await;
        assert_matches::assert_matches!(result, Err(GatewayError::CircuitOpen));
    }

    #[tokio::test]
    async fn caches_successful_response_and_skips_the_second_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"city": "Sao Paulo"})))
            .expect(1)
            .mount(&server)
            .await;

        let registry = Registry::new("./nonexistent");
        let mut c = connector(&server.uri(), AuthSpec::None, ResilienceSpec::default());
        c.integration.cache = Some(CacheSpec { enabled: true, ttl: Some("1m".to_string()), key_pattern: None });
        registry.insert_for_test(c);

        let cache = Arc::new(CacheManager::new(&CacheManagerConfig::default(), None, None));
        let auth_engine = Arc::new(AuthEngine::new(Arc::new(EnvSecretProvider::new()), Arc::new(FileCertificateProvider::new("."))));
        let executor = Executor::new(Arc::new(registry), auth_engine, Arc::new(TransformEngine::default())).with_cache(cache);

        let first = executor.execute(&ctx("01310100")).await.unwrap();
        let second = executor.execute(&ctx("01310100")).await.unwrap();
        assert_eq!(first.data, second.data);
    }
}
