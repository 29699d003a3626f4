//! Cache orchestration (§4, component C2/C7): the two-tier read-through
//! cache sitting in front of the transformation dispatcher, with request
//! coalescing and TTL-by-status-class policy.
//!
//! Kept from the teacher almost unchanged: `control.rs` (RFC 7234
//! `Cache-Control` parsing), `entry.rs`'s created/expires bookkeeping
//! shape, and `request_coalescing`'s leader/follower pattern. Dropped in
//! the final trim: the memory/disk/redis/tiered multi-backend cache
//! stack (`memory.rs`, `disk/`, `redis/`, `tiered.rs`, `sendfile.rs`,
//! `stats.rs`, `warming.rs`, `config.rs`, `traits.rs`) — this proxy has
//! exactly two cache tiers (in-process edge, KV store), not a pluggable
//! N-tier stack, and serves video bytes directly rather than via
//! sendfile.

pub mod control;
pub mod edge;
pub mod entry;
pub mod error;
pub mod key;
pub mod range;
pub mod ttl;

use std::sync::Arc;

use crate::config::cache::TtlConfig;
use crate::error::ProxyError;
use crate::kv::chunk_store::ChunkStore;
use crate::kv::version_counter::VersionCounter;
use crate::kv::PersistentKv;
use crate::request_coalescing::{CoalescingSlot, RequestCoalescer};

use edge::EdgeCache;
use entry::CachedResponse;
use key::VideoCacheKey;

/// Outcome of a cache-orchestrated read, distinguishing which tier
/// answered so callers can record cache-lookup metrics per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Edge,
    Kv,
    Miss,
}

/// Result of [`CacheOrchestrator::get_or_produce`].
pub struct CacheLookup {
    pub response: CachedResponse,
    pub tier: CacheTier,
}

/// Two-tier read-through cache: edge (in-process, `moka`) in front of a
/// durable KV store, with request coalescing so N concurrent misses for
/// the same key invoke the producer once.
pub struct CacheOrchestrator {
    edge: EdgeCache,
    kv: ChunkStore,
    versions: VersionCounter,
    coalescer: RequestCoalescer,
    ttl_defaults: TtlConfig,
}

impl CacheOrchestrator {
    pub fn new(kv: Arc<dyn PersistentKv>, ttl_defaults: TtlConfig) -> Self {
        Self {
            edge: EdgeCache::new(),
            kv: ChunkStore::new(kv.clone()),
            versions: VersionCounter::new(kv),
            coalescer: RequestCoalescer::new(),
            ttl_defaults,
        }
    }

    /// Current version-counter value for a key's namespace (component C6).
    /// Callers read this before building the [`VideoCacheKey`] they'll use
    /// for a lookup, so a hit lands on whatever version the last
    /// successful regeneration bumped to.
    pub async fn current_version(&self, namespace: &str) -> Result<u64, ProxyError> {
        self.versions
            .current(namespace)
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))
    }

    /// Read through both tiers; on a full miss, coalesce concurrent
    /// callers behind one producer invocation, cache the result in both
    /// tiers under the status-class TTL, and return it.
    ///
    /// `producer` is only invoked by the coalescing leader.
    pub async fn get_or_produce<F, Fut>(
        &self,
        key: &VideoCacheKey,
        ttl_override: &ttl::TtlByStatus,
        producer: F,
    ) -> Result<CacheLookup, ProxyError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(u16, Vec<(String, String)>, bytes::Bytes), ProxyError>>,
    {
        let key_str = key.to_string();

        if let Some(cached) = self.edge.get(&key_str).await {
            return Ok(CacheLookup {
                response: (*cached).clone(),
                tier: CacheTier::Edge,
            });
        }

        if let Some(cached) = self.kv.get(&key_str).await.map_err(|e| ProxyError::Internal(e.to_string()))? {
            self.edge.put(key_str.clone(), cached.clone()).await;
            return Ok(CacheLookup {
                response: cached,
                tier: CacheTier::Kv,
            });
        }

        let slot = self.coalescer.acquire(&key_str).await;
        match slot {
            CoalescingSlot::Follower => {
                // The leader has finished; read through again.
                if let Some(cached) = self.kv.get(&key_str).await.map_err(|e| ProxyError::Internal(e.to_string()))? {
                    self.edge.put(key_str.clone(), cached.clone()).await;
                    return Ok(CacheLookup {
                        response: cached,
                        tier: CacheTier::Kv,
                    });
                }
                // The leader's producer failed; run our own rather than
                // returning a phantom miss.
                self.produce_and_store(key, ttl_override, producer).await
            }
            CoalescingSlot::Leader(_guard) => self.produce_and_store(key, ttl_override, producer).await,
        }
    }

    /// Run the producer for a confirmed miss and, on success, bump the
    /// key's version-counter namespace past the version that was read for
    /// this attempt (§4.2 step 5) and store the result under the bumped
    /// version — so the next reader's freshly read `current_version` call
    /// lands on exactly the key this response was stored at.
    async fn produce_and_store<F, Fut>(
        &self,
        key: &VideoCacheKey,
        ttl_override: &ttl::TtlByStatus,
        producer: F,
    ) -> Result<CacheLookup, ProxyError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(u16, Vec<(String, String)>, bytes::Bytes), ProxyError>>,
    {
        let (status, headers, body) = producer().await?;

        let namespace = key.version_namespace();
        let new_version = self
            .versions
            .bump_from(&namespace, key.version)
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))?;
        let stored_key = VideoCacheKey {
            source_path: key.source_path.clone(),
            options: key.options.clone(),
            version: new_version,
        };
        let stored_key_str = stored_key.to_string();

        let ttl_secs = ttl_override.resolve(status, &self.ttl_defaults);
        let content_type = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        self.kv
            .put(&stored_key_str, status, content_type, body.clone())
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))?;

        let response = CachedResponse::new(
            status,
            headers.into_iter().collect(),
            body,
            std::time::Duration::from_secs(ttl_secs),
        );
        self.edge.put(stored_key_str, response.clone()).await;

        Ok(CacheLookup {
            response,
            tier: CacheTier::Miss,
        })
    }

    /// Read a byte range without materializing the whole artifact,
    /// bypassing the edge tier (ranged reads go straight to the KV chunk
    /// store since caching partial windows at the edge would multiply
    /// entries per artifact).
    pub async fn get_range(
        &self,
        key: &VideoCacheKey,
        range: &range::ByteRange,
    ) -> Result<Option<(bytes::Bytes, u64)>, ProxyError> {
        self.kv
            .get_range(&key.to_string(), range)
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))
    }

    /// Total size of a cached artifact without reading its body, so a
    /// `Range` header can be parsed before deciding which chunks to read.
    pub async fn total_size(&self, key: &VideoCacheKey) -> Result<Option<u64>, ProxyError> {
        self.kv
            .total_size(&key.to_string())
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))
    }

    pub fn edge_entry_count(&self) -> u64 {
        self.edge.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKv;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn orchestrator() -> CacheOrchestrator {
        CacheOrchestrator::new(Arc::new(InMemoryKv::new()), TtlConfig::default())
    }

    fn sample_key() -> VideoCacheKey {
        VideoCacheKey {
            source_path: "videos/a.mp4".to_string(),
            options: key::TransformOptions::default(),
            version: 1,
        }
    }

    /// Read the current version for `sample_key()`'s namespace, the way a
    /// caller is expected to before every lookup.
    async fn keyed_for_current_version(orch: &CacheOrchestrator) -> VideoCacheKey {
        let namespace = sample_key().version_namespace();
        let version = orch.current_version(&namespace).await.unwrap();
        VideoCacheKey { version, ..sample_key() }
    }

    #[tokio::test]
    async fn miss_invokes_producer_and_caches_result() {
        let orch = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let key = keyed_for_current_version(&orch).await;
        let lookup = orch
            .get_or_produce(&key, &ttl::TtlByStatus::default(), || async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok((200, vec![("content-type".to_string(), "video/mp4".to_string())], bytes::Bytes::from_static(b"abc")))
            })
            .await
            .unwrap();

        assert_eq!(lookup.tier, CacheTier::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The producer's success bumped the namespace's version; re-reading
        // it (as every caller does) lands on exactly the key that was
        // just stored, so this is a hit rather than another miss.
        let key2 = keyed_for_current_version(&orch).await;
        assert_eq!(key2.version, key.version + 1);
        let lookup2 = orch
            .get_or_produce(&key2, &ttl::TtlByStatus::default(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                unreachable!("should be served from edge cache")
            })
            .await
            .unwrap();
        assert_eq!(lookup2.tier, CacheTier::Edge);
    }

    #[tokio::test]
    async fn producer_error_propagates_without_caching() {
        let orch = orchestrator();
        let result = orch
            .get_or_produce(&sample_key(), &ttl::TtlByStatus::default(), || async {
                Err(ProxyError::SourceNotFound("x".to_string()))
            })
            .await;
        assert!(result.is_err());
    }
}
