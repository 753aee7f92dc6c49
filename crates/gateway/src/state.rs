//! Shared application state handed to every `axum` handler.

use std::sync::Arc;

use gateway_core::auth::AuthEngine;
use gateway_core::cache::CacheManager;
use gateway_core::executor::Executor;
use gateway_core::freemium::FreemiumLimiter;
use gateway_core::metrics::Metrics;
use gateway_core::registry::Registry;
use gateway_core::transform::TransformEngine;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub executor: Arc<Executor>,
    pub freemium: Arc<FreemiumLimiter>,
    pub metrics: Arc<Metrics>,
    pub cache: Arc<CacheManager>,
    /// The process's active deployment environment (`--environment`/`ENVIRONMENT`), used to
    /// pick which of a connector's named environments to call.
    pub environment: String,
}

/// Parameters built up at startup before the router exists; kept separate from [`AppState`]
/// so `main` can construct things in dependency order without partially-initialized state.
pub struct Components {
    pub registry: Arc<Registry>,
    pub auth_engine: Arc<AuthEngine>,
    pub transformer: Arc<TransformEngine>,
    pub cache: Arc<CacheManager>,
    pub freemium: Arc<FreemiumLimiter>,
    pub metrics: Arc<Metrics>,
    pub environment: String,
}

impl Components {
    pub fn into_state(self) -> AppState {
        let executor = Executor::new(self.registry.clone(), self.auth_engine, self.transformer)
            .with_cache(self.cache.clone())
            .with_metrics(self.metrics.clone());
        AppState {
            registry: self.registry,
            executor: Arc::new(executor),
            freemium: self.freemium,
            metrics: self.metrics,
            cache: self.cache,
            environment: self.environment,
        }
    }
}
