//! Monotonic version counter namespace (§3 VersionCounter, §4.2 step 5,
//! §4.6, component C6).
//!
//! Backed by the same [`PersistentKv`] binding as the chunk store, keyed
//! by a cache key's namespace (everything but the `:v<n>` suffix — see
//! [`crate::cache::key::VideoCacheKey::version_namespace`]). Starts at 1
//! and advances by compare-and-swap so two concurrent regenerations of
//! the same derivative never collide on the same counter value.

use std::sync::Arc;

use bytes::Bytes;

use super::PersistentKv;
use crate::cache::error::CacheError;

const STARTING_VERSION: u64 = 1;

pub struct VersionCounter {
    kv: Arc<dyn PersistentKv>,
}

impl VersionCounter {
    pub fn new(kv: Arc<dyn PersistentKv>) -> Self {
        Self { kv }
    }

    fn counter_key(namespace: &str) -> String {
        format!("{namespace}::version")
    }

    /// Current version for a namespace, defaulting to the starting value
    /// when nothing has ever bumped it.
    pub async fn current(&self, namespace: &str) -> Result<u64, CacheError> {
        match self.kv.get(&Self::counter_key(namespace)).await? {
            Some(bytes) => Ok(parse(&bytes).unwrap_or(STARTING_VERSION)),
            None => Ok(STARTING_VERSION),
        }
    }

    /// Atomically advance the namespace's version past `from`, retrying on
    /// concurrent writers until the compare-and-swap succeeds.
    pub async fn bump_from(&self, namespace: &str, from: u64) -> Result<u64, CacheError> {
        let key = Self::counter_key(namespace);
        let mut existing = self.kv.get(&key).await?;
        loop {
            let current = existing.as_ref().and_then(parse).unwrap_or(STARTING_VERSION).max(from);
            let next = current + 1;
            let swapped = self
                .kv
                .compare_and_swap(&key, existing.clone(), Bytes::from(next.to_string()))
                .await?;
            if swapped {
                return Ok(next);
            }
            existing = self.kv.get(&key).await?;
        }
    }
}

fn parse(bytes: &Bytes) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKv;

    #[tokio::test]
    async fn current_defaults_to_one_when_absent() {
        let counter = VersionCounter::new(Arc::new(InMemoryKv::new()));
        assert_eq!(counter.current("ns").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bump_advances_past_the_read_value() {
        let counter = VersionCounter::new(Arc::new(InMemoryKv::new()));
        let v1 = counter.current("ns").await.unwrap();
        let v2 = counter.bump_from("ns", v1).await.unwrap();
        assert_eq!(v2, v1 + 1);
        assert_eq!(counter.current("ns").await.unwrap(), v2);
    }

    #[tokio::test]
    async fn bump_is_monotonic_across_repeated_regenerations() {
        let counter = VersionCounter::new(Arc::new(InMemoryKv::new()));
        let mut version = counter.current("ns").await.unwrap();
        for _ in 0..5 {
            version = counter.bump_from("ns", version).await.unwrap();
        }
        assert_eq!(version, 6);
    }

    #[tokio::test]
    async fn distinct_namespaces_have_independent_counters() {
        let counter = VersionCounter::new(Arc::new(InMemoryKv::new()));
        counter.bump_from("a", 1).await.unwrap();
        assert_eq!(counter.current("b").await.unwrap(), STARTING_VERSION);
    }
}
