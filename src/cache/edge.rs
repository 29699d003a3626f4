//! In-process edge HTTP cache tier (§4 two-tier cache, first tier).
//!
//! A bounded `moka` cache in front of the KV store: cheap to check, scoped
//! to a single edge instance, and never the source of truth — every write
//! here is mirrored to the KV store so a cold instance still hits.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use super::entry::CachedResponse;
use crate::constants::EDGE_CACHE_MAX_ENTRIES;

#[derive(Clone)]
pub struct EdgeCache {
    inner: MokaCache<String, Arc<CachedResponse>>,
}

impl EdgeCache {
    pub fn new() -> Self {
        Self::with_capacity(EDGE_CACHE_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(24 * 3600))
            .build();
        Self { inner }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<CachedResponse>> {
        let entry = self.inner.get(key).await?;
        if entry.is_expired() {
            self.inner.invalidate(key).await;
            return None;
        }
        Some(entry)
    }

    pub async fn put(&self, key: String, response: CachedResponse) {
        self.inner.insert(key, Arc::new(response)).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for EdgeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use bytes::Bytes;

    fn response(ttl: Duration) -> CachedResponse {
        CachedResponse::new(200, HashMap::new(), Bytes::from_static(b"x"), ttl)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = EdgeCache::new();
        cache.put("k1".to_string(), response(Duration::from_secs(60))).await;
        let got = cache.get("k1").await;
        assert!(got.is_some());
        assert_eq!(got.unwrap().status, 200);
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_a_miss() {
        let cache = EdgeCache::new();
        cache.put("k1".to_string(), response(Duration::from_secs(0))).await;
        assert!(cache.get("k1").await.is_none());
    }

    #[tokio::test]
    async fn miss_on_unknown_key() {
        let cache = EdgeCache::new();
        assert!(cache.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = EdgeCache::new();
        cache.put("k1".to_string(), response(Duration::from_secs(60))).await;
        cache.invalidate("k1").await;
        assert!(cache.get("k1").await.is_none());
    }
}
