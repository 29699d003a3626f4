//! Presigned-URL cache (§4 C4 implementation notes, Open Question 3).
//!
//! A bounded `moka::sync::Cache` keyed by a hash of the resolved auth
//! material (the env values at resolution time, not the env var names),
//! so a rotated credential misses the cache instead of serving a stale
//! signature. Per-entry TTL is set to the presigned URL's own validity
//! minus [`PRESIGN_SAFETY_MARGIN_SECS`]. Grounded on the teacher's
//! moka-based bounded caches (`Cargo.toml`'s `moka` dependency, used
//! elsewhere for the edge HTTP cache tier in `cache/edge.rs`).

use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;

use crate::constants::{PRESIGN_CACHE_MAX_ENTRIES, PRESIGN_SAFETY_MARGIN_SECS};

/// A signed, ready-to-use source URL plus the headers required alongside it.
#[derive(Debug, Clone)]
pub struct PresignedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Internal cache value pairing the request with its per-entry TTL, since
/// moka's `Expiry` callback only receives the stored value (not an
/// out-of-band TTL argument like the `insert_with_ttl` API this was
/// originally written against, which does not exist in moka 0.12).
#[derive(Debug, Clone)]
struct StoredEntry {
    request: PresignedRequest,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<u64, StoredEntry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &u64, value: &StoredEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded cache of presigned requests, keyed by a hash of the resolved
/// auth material so rotated credentials naturally produce a fresh entry.
pub struct PresignCache {
    inner: Cache<u64, StoredEntry>,
}

impl PresignCache {
    pub fn new() -> Self {
        Self::with_capacity(PRESIGN_CACHE_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Hash the resolved auth material (not the env var names) together
    /// with the request identity, so a credential rotation or a request
    /// to a different path/method naturally produces a different key.
    pub fn key_for(method: &str, url: &str, auth_material: &str) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        method.hash(&mut hasher);
        url.hash(&mut hasher);
        auth_material.hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&self, key: u64) -> Option<PresignedRequest> {
        self.inner.get(&key).map(|entry| entry.request)
    }

    /// Insert a presigned request, expiring it `validity_secs` minus the
    /// safety margin from now. A `validity_secs` at or below the margin
    /// is clamped to a minimum TTL of one second rather than caching
    /// something that is already considered stale.
    pub fn put(&self, key: u64, request: PresignedRequest, validity_secs: u64) {
        let effective = validity_secs.saturating_sub(PRESIGN_SAFETY_MARGIN_SECS).max(1);
        self.inner.insert(
            key,
            StoredEntry {
                request,
                ttl: Duration::from_secs(effective),
            },
        );
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for PresignCache {
    fn default() -> Self {
        Self::new()
    }
}
