//! Persistent KV store binding (§4 KV chunking, component C1).
//!
//! `PersistentKv` abstracts over the edge platform's key-value binding the
//! same way the teacher's `DiskBackend` trait abstracts over the
//! filesystem: a small async surface the orchestrator and chunk store
//! program against, with an in-memory fake standing in for tests.

pub mod chunk_store;
pub mod manifest;
pub mod version_counter;

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::error::CacheError;

/// Minimal KV binding: get/put/put_if_absent/delete plus a compare-and-swap
/// used for the version-counter namespace (C7) and the chunk write lock
/// (C1) so two edge instances never interleave writes for the same key.
#[async_trait]
pub trait PersistentKv: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn put(&self, key: &str, value: Bytes) -> Result<(), CacheError>;

    /// Write only if the key does not already exist. Returns `false`
    /// without writing if it does.
    async fn put_if_absent(&self, key: &str, value: Bytes) -> Result<bool, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Atomically replace `key`'s value if its current value equals
    /// `expected` (`None` meaning "must not exist"). Returns `false`
    /// without writing on mismatch.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Bytes>,
        new: Bytes,
    ) -> Result<bool, CacheError>;
}

/// In-memory fake used by tests and, until a real binding is wired by the
/// host integration, as the default. Not a durable store: restarting the
/// process loses everything, exactly like every other in-process fake
/// lower in this crate.
#[derive(Default, Clone)]
pub struct InMemoryKv {
    inner: std::sync::Arc<parking_lot::Mutex<std::collections::HashMap<String, Bytes>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentKv for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.inner.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        self.inner.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: Bytes) -> Result<bool, CacheError> {
        let mut guard = self.inner.lock();
        if guard.contains_key(key) {
            return Ok(false);
        }
        guard.insert(key.to_string(), value);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.lock().remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Bytes>,
        new: Bytes,
    ) -> Result<bool, CacheError> {
        let mut guard = self.inner.lock();
        let current = guard.get(key).cloned();
        if current != expected {
            return Ok(false);
        }
        guard.insert(key.to_string(), new);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let kv = InMemoryKv::new();
        kv.put("k", Bytes::from_static(b"v")).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn put_if_absent_rejects_existing_key() {
        let kv = InMemoryKv::new();
        assert!(kv.put_if_absent("k", Bytes::from_static(b"a")).await.unwrap());
        assert!(!kv.put_if_absent("k", Bytes::from_static(b"b")).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some(Bytes::from_static(b"a")));
    }

    #[tokio::test]
    async fn compare_and_swap_only_succeeds_on_matching_expected() {
        let kv = InMemoryKv::new();
        kv.put("k", Bytes::from_static(b"a")).await.unwrap();

        let ok = kv
            .compare_and_swap("k", Some(Bytes::from_static(b"wrong")), Bytes::from_static(b"b"))
            .await
            .unwrap();
        assert!(!ok);

        let ok = kv
            .compare_and_swap("k", Some(Bytes::from_static(b"a")), Bytes::from_static(b"b"))
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(kv.get("k").await.unwrap(), Some(Bytes::from_static(b"b")));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let kv = InMemoryKv::new();
        kv.put("k", Bytes::from_static(b"v")).await.unwrap();
        kv.delete("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }
}
