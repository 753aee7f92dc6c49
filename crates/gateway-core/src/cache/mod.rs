//! Multi-Level Cache Manager (SPEC_FULL.md §4.G): L1 (in-process, cost-bounded,
//! approximate-LFU) → L2 (injectable shared KV, in-process map by default) → L3
//! (injectable, durable) cascade with promotion-on-hit. Grounded on the original's
//! `internal/cache/manager.go`, `l1_memory.go`, `l2_redis.go`.

mod l1;
mod l2;
mod l3;

pub use l1::L1Cache;
pub use l2::{InProcessSharedCache, SharedCache};
pub use l3::DurableCache;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::metrics::{CacheLabels, Metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLevel {
    L1,
    L2,
    L3,
    External,
}

impl CacheLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLevel::L1 => "l1",
            CacheLevel::L2 => "l2",
            CacheLevel::L3 => "l3",
            CacheLevel::External => "external",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("L2 error: {0}")]
    L2(String),
    #[error("L3 error: {0}")]
    L3(String),
}

pub struct CacheManagerConfig {
    pub enable_l1: bool,
    pub enable_l2: bool,
    pub enable_l3: bool,
    pub l1_max_cost: u64,
    pub default_ttl: Duration,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        CacheManagerConfig {
            enable_l1: true,
            enable_l2: false,
            enable_l3: false,
            l1_max_cost: 100 * 1024 * 1024,
            default_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// Coordinates the L1 -> L2 -> L3 cascade (SPEC_FULL.md §4.G). L2/L3 errors are counted and
/// treated as misses so a lower level can still serve the request.
pub struct CacheManager {
    l1: Option<L1Cache>,
    l2: Option<Arc<dyn SharedCache>>,
    l3: Option<Arc<dyn DurableCache>>,
    metrics: Option<Arc<Metrics>>,
}

impl CacheManager {
    pub fn new(config: &CacheManagerConfig, l2: Option<Arc<dyn SharedCache>>, l3: Option<Arc<dyn DurableCache>>) -> Self {
        CacheManager {
            l1: config.enable_l1.then(|| L1Cache::new(config.l1_max_cost)),
            l2: if config.enable_l2 { l2 } else { None },
            l3: if config.enable_l3 { l3 } else { None },
            metrics: None,
        }
    }

    /// Attaches the shared metrics registry so cache hits, misses, errors, and promotions are
    /// counted by level (SPEC_FULL.md §4.J).
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record_hit(&self, level: CacheLevel) {
        if let Some(metrics) = &self.metrics {
            metrics.cache_hits.get_or_create(&CacheLabels { level: level.as_str().to_string() }).inc();
        }
    }

    fn record_promotion(&self, level: CacheLevel) {
        if let Some(metrics) = &self.metrics {
            metrics.cache_promotions.get_or_create(&CacheLabels { level: level.as_str().to_string() }).inc();
        }
    }

    fn record_error(&self, level: CacheLevel) {
        if let Some(metrics) = &self.metrics {
            metrics.cache_errors.get_or_create(&CacheLabels { level: level.as_str().to_string() }).inc();
        }
    }

    pub async fn get(&self, key: &str) -> (Option<Value>, CacheLevel) {
        if let Some(l1) = &self.l1
            && let Some(value) = l1.get(key)
        {
            self.record_hit(CacheLevel::L1);
            return (Some(value), CacheLevel::L1);
        }

        if let Some(l2) = &self.l2 {
            match l2.get(key).await {
                Ok(Some(value)) => {
                    if let Some(l1) = &self.l1 {
                        l1.set(key, value.clone(), None);
                        self.record_promotion(CacheLevel::L1);
                    }
                    self.record_hit(CacheLevel::L2);
                    return (Some(value), CacheLevel::L2);
                }
                Ok(None) => {}
                Err(_) => self.record_error(CacheLevel::L2),
            }
        }

        if let Some(l3) = &self.l3 {
            match l3.get(key).await {
                Ok(Some(value)) => {
                    if let Some(l2) = &self.l2 {
                        let _ = l2.set(key, &value, None).await;
                        self.record_promotion(CacheLevel::L2);
                    }
                    if let Some(l1) = &self.l1 {
                        l1.set(key, value.clone(), None);
                        self.record_promotion(CacheLevel::L1);
                    }
                    self.record_hit(CacheLevel::L3);
                    return (Some(value), CacheLevel::L3);
                }
                Ok(None) => {}
                Err(_) => self.record_error(CacheLevel::L3),
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.cache_misses.get_or_create(&CacheLabels { level: CacheLevel::External.as_str().to_string() }).inc();
        }
        (None, CacheLevel::External)
    }

    /// Writes to every enabled level, mirroring the original's cascade-reversal `Set`. Every
    /// level is attempted even if an earlier one fails; failures are collected and returned
    /// together rather than short-circuiting the remaining levels.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), Vec<CacheError>> {
        let mut errors = Vec::new();
        if let Some(l1) = &self.l1 {
            l1.set(key, value.clone(), ttl);
        }
        if let Some(l2) = &self.l2
            && let Err(error) = l2.set(key, &value, ttl).await
        {
            self.record_error(CacheLevel::L2);
            errors.push(error);
        }
        if let Some(l3) = &self.l3
            && let Err(error) = l3.set(key, &value, ttl).await
        {
            self.record_error(CacheLevel::L3);
            errors.push(error);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub async fn delete(&self, key: &str) -> Result<(), Vec<CacheError>> {
        let mut errors = Vec::new();
        if let Some(l1) = &self.l1 {
            l1.delete(key);
        }
        if let Some(l2) = &self.l2
            && let Err(error) = l2.delete(key).await
        {
            self.record_error(CacheLevel::L2);
            errors.push(error);
        }
        if let Some(l3) = &self.l3
            && let Err(error) = l3.delete(key).await
        {
            self.record_error(CacheLevel::L3);
            errors.push(error);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub async fn clear(&self) -> Result<(), Vec<CacheError>> {
        let mut errors = Vec::new();
        if let Some(l1) = &self.l1 {
            l1.clear();
        }
        if let Some(l2) = &self.l2
            && let Err(error) = l2.clear().await
        {
            self.record_error(CacheLevel::L2);
            errors.push(error);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn l1_only_round_trips() {
        let manager = CacheManager::new(&CacheManagerConfig::default(), None, None);
        manager.set("k", json!({"a": 1}), None).await.unwrap();
        let (value, level) = manager.get("k").await;
        assert_eq!(value, Some(json!({"a": 1})));
        assert_eq!(level, CacheLevel::L1);
    }

    #[tokio::test]
    async fn l2_hit_promotes_to_l1() {
        let l2: Arc<dyn SharedCache> = Arc::new(InProcessSharedCache::new("test:"));
        l2.set("k", &json!("v"), None).await.unwrap();

        let mut config = CacheManagerConfig::default();
        config.enable_l2 = true;
        let manager = CacheManager::new(&config, Some(l2), None);

        let (value, level) = manager.get("k").await;
        assert_eq!(value, Some(json!("v")));
        assert_eq!(level, CacheLevel::L2);

        let (value, level) = manager.get("k").await;
        assert_eq!(value, Some(json!("v")));
        assert_eq!(level, CacheLevel::L1);
    }

    #[tokio::test]
    async fn miss_across_every_level_returns_external() {
        let manager = CacheManager::new(&CacheManagerConfig::default(), None, None);
        let (value, level) = manager.get("nope").await;
        assert_eq!(value, None);
        assert_eq!(level, CacheLevel::External);
    }

    #[tokio::test]
    async fn delete_removes_from_l1() {
        let manager = CacheManager::new(&CacheManagerConfig::default(), None, None);
        manager.set("k", json!(1), None).await.unwrap();
        manager.delete("k").await.unwrap();
        assert_eq!(manager.get("k").await.0, None);
    }

    struct FailingSharedCache;

    #[async_trait::async_trait]
    impl SharedCache for FailingSharedCache {
        async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: &Value, _ttl: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::L2("unreachable".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::L2("unreachable".to_string()))
        }
        async fn clear(&self) -> Result<(), CacheError> {
            Err(CacheError::L2("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn set_reports_l2_failure_without_skipping_l1() {
        let mut config = CacheManagerConfig::default();
        config.enable_l2 = true;
        let l2: Arc<dyn SharedCache> = Arc::new(FailingSharedCache);
        let manager = CacheManager::new(&config, Some(l2), None);

        let result = manager.set("k", json!(1), None).await;
        assert_eq!(result.unwrap_err().len(), 1);
        // L1 write still happened even though L2 failed.
        assert_eq!(manager.get("k").await, (Some(json!(1)), CacheLevel::L1));
    }
}
