//! Object store binding (§3 `ObjectStore` source kind, component C4).
//!
//! The edge platform's native storage binding (the thing `bindingName`
//! in configuration refers to) is an external collaborator, specified
//! only by interface here — the same stance the specification takes on
//! logging sinks. [`InMemoryObjectStore`] is the fake used by tests and
//! by the host integration until a real binding is wired in, grounded on
//! the teacher's `disk/mock_backend.rs` in-memory `DiskBackend` fake.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::ProxyError;

pub struct ObjectStoreResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

#[async_trait]
pub trait ObjectStoreBinding: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<ObjectStoreResponse>, ProxyError>;
}

/// Named set of object store bindings, resolved by `bindingName`.
#[derive(Clone, Default)]
pub struct ObjectStoreRegistry {
    bindings: HashMap<String, Arc<dyn ObjectStoreBinding>>,
}

impl ObjectStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, binding: Arc<dyn ObjectStoreBinding>) {
        self.bindings.insert(name.into(), binding);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ObjectStoreBinding>> {
        self.bindings.get(name).cloned()
    }
}

/// In-memory object store fake, keyed by path.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, ObjectRecord>>,
}

struct ObjectRecord {
    content_type: String,
    body: Bytes,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<String>, content_type: impl Into<String>, body: Bytes) {
        self.objects.write().insert(
            path.into(),
            ObjectRecord {
                content_type: content_type.into(),
                body,
            },
        );
    }
}

#[async_trait]
impl ObjectStoreBinding for InMemoryObjectStore {
    async fn get(&self, path: &str) -> Result<Option<ObjectStoreResponse>, ProxyError> {
        let objects = self.objects.read();
        Ok(objects.get(path).map(|record| ObjectStoreResponse {
            status: 200,
            content_type: record.content_type.clone(),
            body: record.body.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_stored_object() {
        let store = InMemoryObjectStore::new();
        store.put("videos/a.mp4", "video/mp4", Bytes::from_static(b"bytes"));
        let resp = store.get("videos/a.mp4").await.unwrap().unwrap();
        assert_eq!(resp.content_type, "video/mp4");
        assert_eq!(resp.body, Bytes::from_static(b"bytes"));
    }

    #[tokio::test]
    async fn missing_object_is_none_not_an_error() {
        let store = InMemoryObjectStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn registry_resolves_binding_by_name() {
        let mut registry = ObjectStoreRegistry::new();
        let store: Arc<dyn ObjectStoreBinding> = Arc::new(InMemoryObjectStore::new());
        registry.register("VIDEOS", store);
        assert!(registry.get("VIDEOS").is_some());
        assert!(registry.get("OTHER").is_none());
    }
}
