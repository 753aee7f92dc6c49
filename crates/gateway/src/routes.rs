//! `axum` HTTP surface: health, metrics, connector catalog, and endpoint execution.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use gateway_core::error::GatewayError;
use gateway_core::freemium::{reset_unix, resolve_identity};
use gateway_core::types::ExecutionContext;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/connectors", get(list_connectors))
        .route("/v1/connectors/{id}", get(get_connector))
        .route("/v1/connectors/{id}/{endpoint}", post(execute_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    connectors: usize,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthBody { status: "ok", connectors: state.registry.count() })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response(),
    }
}

#[derive(Serialize)]
struct ConnectorSummary {
    id: String,
    name: String,
    version: String,
    provider: String,
    endpoints: Vec<String>,
}

async fn list_connectors(State(state): State<AppState>) -> impl IntoResponse {
    let summaries: Vec<ConnectorSummary> = state
        .registry
        .list()
        .into_iter()
        .map(|connector| ConnectorSummary {
            id: connector.id,
            name: connector.name,
            version: connector.version,
            provider: connector.provider,
            endpoints: connector.integration.endpoints.keys().cloned().collect(),
        })
        .collect();
    Json(summaries)
}

async fn get_connector(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id) {
        Ok(connector) => Json(connector).into_response(),
        Err(error) => GatewayError::from(error).into_response(),
    }
}

async fn execute_endpoint(
    State(state): State<AppState>,
    Path((id, endpoint)): Path<(String, String)>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(params): Json<HashMap<String, Value>>,
) -> Response {
    let identity = identity_from_request(&headers, peer);
    let kind = if identity.starts_with("user:") { "user" } else { "ip" };

    let decision = state.freemium.check(&identity).await;
    let mut response_headers = HeaderMap::new();
    response_headers.insert("X-RateLimit-Limit", header_value(decision.limit));
    response_headers.insert("X-RateLimit-Remaining", header_value(decision.remaining));
    if let Ok(value) = reset_unix(decision.reset_at).to_string().parse() {
        response_headers.insert("X-RateLimit-Reset", value);
    }

    if !decision.allowed {
        state.metrics.freemium_rejected.get_or_create(&gateway_core::metrics::IdentityKindLabels { identity_kind: kind.to_string() }).inc();
        let body = serde_json::json!({
            "error": "rate_limit_exceeded",
            "message": format!("Free tier limit of {} requests reached.", decision.limit),
            "remaining": 0,
            "reset_at": reset_unix(decision.reset_at),
        });
        return (StatusCode::TOO_MANY_REQUESTS, response_headers, Json(body)).into_response();
    }
    state.freemium.increment(&identity);
    state.metrics.freemium_allowed.get_or_create(&gateway_core::metrics::IdentityKindLabels { identity_kind: kind.to_string() }).inc();

    let environment = environment_param(&params, &state.environment);
    let ctx = ExecutionContext { connector_id: id, endpoint_name: endpoint, environment, params };

    // Request/latency counters for this call are recorded inside the Executor itself, so
    // every caller of gateway-core (not just this HTTP surface) gets them for free.
    match state.executor.execute(&ctx).await {
        Ok(outcome) => (StatusCode::OK, response_headers, Json(outcome)).into_response(),
        Err(error) => {
            let mut response = error.into_response();
            for (name, value) in response_headers.iter() {
                response.headers_mut().insert(name, value.clone());
            }
            response
        }
    }
}

fn environment_param(params: &HashMap<String, Value>, default_environment: &str) -> String {
    params.get("environment").and_then(Value::as_str).unwrap_or(default_environment).to_string()
}

fn identity_from_request(headers: &HeaderMap, peer: SocketAddr) -> String {
    let user_id = headers.get("x-user-id").and_then(|v| v.to_str().ok());
    let xff = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
    let xri = headers.get("x-real-ip").and_then(|v| v.to_str().ok());
    resolve_identity(user_id, xff, xri, Some(peer.ip()))
}

fn header_value(n: u32) -> axum::http::HeaderValue {
    if n == u32::MAX {
        axum::http::HeaderValue::from_static("unlimited")
    } else {
        axum::http::HeaderValue::from_str(&n.to_string()).expect("numeric header value is always valid")
    }
}
