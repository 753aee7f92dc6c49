//! L3: interface-level durable cache (SPEC_FULL.md §4.G), intended for a materialized store
//! (the original injects a PostgreSQL-backed implementation via `SetL3Cache`; no concrete
//! implementor ships with the core — callers inject their own at startup).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::CacheError;

#[async_trait]
pub trait DurableCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
