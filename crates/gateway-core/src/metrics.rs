//! Observability (SPEC_FULL.md §4.J): a `prometheus-client` registry collecting executor,
//! cache, circuit-breaker, rate-limiter, and freemium counters/histograms.

use prometheus_client::encoding::{EncodeLabelSet, text};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ExecutorLabels {
    pub connector: String,
    pub endpoint: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheLabels {
    pub level: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ConnectorLabels {
    pub connector: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct IdentityKindLabels {
    pub identity_kind: String,
}

/// Owns every metric family the gateway emits and the registry they're registered into.
/// Constructed once at startup and shared behind an `Arc` (SPEC_FULL.md §4.J).
pub struct Metrics {
    pub registry: Registry,
    pub executor_requests: Family<ExecutorLabels, Counter>,
    pub executor_latency: Family<ExecutorLabels, Histogram>,
    pub cache_hits: Family<CacheLabels, Counter>,
    pub cache_misses: Family<CacheLabels, Counter>,
    pub cache_errors: Family<CacheLabels, Counter>,
    pub cache_promotions: Family<CacheLabels, Counter>,
    pub circuit_breaker_rejections: Family<ConnectorLabels, Counter>,
    pub rate_limiter_rejections: Family<ConnectorLabels, Counter>,
    pub freemium_allowed: Family<IdentityKindLabels, Counter>,
    pub freemium_rejected: Family<IdentityKindLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        let mut registry = Registry::default();

        let executor_requests = Family::<ExecutorLabels, Counter>::default();
        registry.register("gateway_executor_requests", "Total connector executions by outcome", executor_requests.clone());

        let executor_latency = Family::<ExecutorLabels, Histogram>::new_with_constructor(|| Histogram::new(exponential_buckets(0.005, 2.0, 12)));
        registry.register("gateway_executor_duration_seconds", "Connector execution latency", executor_latency.clone());

        let cache_hits = Family::<CacheLabels, Counter>::default();
        registry.register("gateway_cache_hits", "Cache hits by level", cache_hits.clone());

        let cache_misses = Family::<CacheLabels, Counter>::default();
        registry.register("gateway_cache_misses", "Cache misses by level", cache_misses.clone());

        let cache_errors = Family::<CacheLabels, Counter>::default();
        registry.register("gateway_cache_errors", "Cache errors by level", cache_errors.clone());

        let cache_promotions = Family::<CacheLabels, Counter>::default();
        registry.register("gateway_cache_promotions", "Cache entries promoted to a faster level", cache_promotions.clone());

        let circuit_breaker_rejections = Family::<ConnectorLabels, Counter>::default();
        registry.register("gateway_circuit_breaker_rejections", "Requests rejected by an open circuit breaker", circuit_breaker_rejections.clone());

        let rate_limiter_rejections = Family::<ConnectorLabels, Counter>::default();
        registry.register("gateway_rate_limiter_rejections", "Requests rejected by the local rate limiter", rate_limiter_rejections.clone());

        let freemium_allowed = Family::<IdentityKindLabels, Counter>::default();
        registry.register("gateway_freemium_allowed", "Freemium-guarded requests allowed", freemium_allowed.clone());

        let freemium_rejected = Family::<IdentityKindLabels, Counter>::default();
        registry.register("gateway_freemium_rejected", "Freemium-guarded requests rejected", freemium_rejected.clone());

        Metrics {
            registry,
            executor_requests,
            executor_latency,
            cache_hits,
            cache_misses,
            cache_errors,
            cache_promotions,
            circuit_breaker_rejections,
            rate_limiter_rejections,
            freemium_allowed,
            freemium_rejected,
        }
    }
}

impl Metrics {
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}
