use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A declarative spec describing how to call one upstream API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Connector {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub provider: String,
    pub integration: IntegrationSpec,
    pub environments: HashMap<String, Environment>,
    #[serde(default)]
    pub compliance: Option<ComplianceSpec>,
    #[serde(default)]
    pub governance: Option<GovernanceSpec>,
    #[serde(default)]
    pub observability: Option<ObservabilitySpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Environment {
    pub base_url: String,
    #[serde(default)]
    pub health_check: Option<String>,
}

/// `integration.type`: only `rest_api` is executable today; other values are accepted for
/// cataloguing but rejected by the Executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    RestApi,
    Soap,
    Graphql,
    Grpc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntegrationSpec {
    #[serde(rename = "type")]
    pub kind: IntegrationType,
    pub auth: AuthSpec,
    pub endpoints: HashMap<String, EndpointSpec>,
    #[serde(default)]
    pub resilience: ResilienceSpec,
    #[serde(default)]
    pub cache: Option<CacheSpec>,
}

/// Tagged auth variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthSpec {
    None,
    ApiKey {
        #[serde(default = "default_api_key_header")]
        header_name: String,
        key_ref: String,
    },
    OAuth2 {
        token_url: String,
        client_id: String,
        client_secret_ref: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
    Mtls {
        certificate_ref: String,
        #[serde(default)]
        ca_cert_path: Option<String>,
    },
    Basic {
        #[serde(default)]
        username_ref: Option<String>,
        #[serde(default)]
        password_ref: Option<String>,
    },
    Jwt {
        #[serde(default)]
        secret_ref: Option<String>,
    },
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BodySpec {
    pub content_type: String,
    #[serde(default)]
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransformSpec {
    pub field: String,
    pub op: String,
    #[serde(default)]
    pub values: Option<HashMap<String, String>>,
    #[serde(default)]
    pub params: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResponseSpec {
    #[serde(default)]
    pub success_status: Vec<u16>,
    #[serde(default)]
    pub error_status: Vec<u16>,
    #[serde(default)]
    pub mapping: HashMap<String, String>,
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EndpointSpec {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub path_params: Vec<ParameterSpec>,
    #[serde(default)]
    pub query_params: Vec<ParameterSpec>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<BodySpec>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub response: ResponseSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Constant,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetrySpec {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_initial_interval")]
    pub initial_interval: String,
    #[serde(default = "default_max_interval")]
    pub max_interval: String,
}

impl Default for BackoffKind {
    fn default() -> Self {
        BackoffKind::Constant
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_interval() -> String {
    "100ms".to_string()
}
fn default_max_interval() -> String {
    "30s".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CircuitBreakerSpec {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f64,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_breaker_timeout")]
    pub timeout: String,
}

fn default_failure_threshold() -> f64 {
    0.6
}
fn default_success_threshold() -> u32 {
    1
}
fn default_breaker_timeout() -> String {
    "30s".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RateLimitSpec {
    pub requests_per_minute: u32,
    #[serde(default)]
    pub burst: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResilienceSpec {
    #[serde(default)]
    pub retry: Option<RetrySpec>,
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerSpec>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ttl: Option<String>,
    #[serde(default)]
    pub key_pattern: Option<String>,
}

/// Carried verbatim, not interpreted by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComplianceSpec {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub data_classification: Option<String>,
    #[serde(default)]
    pub retention_days: Option<u32>,
    #[serde(default)]
    pub encryption_required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GovernanceSpec {
    #[serde(default)]
    pub owner_team: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub last_audited: Option<String>,
    #[serde(default)]
    pub review_frequency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlertSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f64,
    pub window: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObservabilitySpec {
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    #[serde(default = "default_true")]
    pub tracing_enabled: bool,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub alerts: Vec<AlertSpec>,
}

fn default_true() -> bool {
    true
}

/// Execution input bound by the Executor to a concrete request.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub connector_id: String,
    pub endpoint_name: String,
    pub environment: String,
    pub params: HashMap<String, serde_json::Value>,
}

/// Result of driving the Executor to completion.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub data: serde_json::Value,
    pub status_code: u16,
    pub duration_ms: f64,
}
