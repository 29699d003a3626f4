//! Chunk manifest record (§4 KV chunking).

use serde::{Deserialize, Serialize};

/// Describes how a single logical artifact is split across chunk keys.
/// Stored at the artifact's base key; each chunk is stored at
/// `<base_key>::chunk::<index>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkManifest {
    pub total_size: u64,
    pub chunk_size: u64,
    pub chunk_count: u32,
    pub status: u16,
    pub content_type: String,
    #[serde(default)]
    pub etag: Option<String>,
}

impl ChunkManifest {
    pub fn new(total_size: u64, chunk_size: u64, status: u16, content_type: String) -> Self {
        let chunk_count = total_size.div_ceil(chunk_size).max(1) as u32;
        Self {
            total_size,
            chunk_size,
            chunk_count,
            status,
            content_type,
            etag: None,
        }
    }

    pub fn chunk_key(&self, base_key: &str, index: u32) -> String {
        format!("{base_key}::chunk::{index}")
    }

    /// Inclusive index range of chunks covering a byte span.
    pub fn chunk_range_for(&self, start: u64, end: u64) -> (u32, u32) {
        let first = (start / self.chunk_size) as u32;
        let last = (end / self.chunk_size).min((self.chunk_count - 1) as u64) as u32;
        (first, last)
    }

    /// Byte offset within the full artifact where chunk `index` begins.
    pub fn chunk_offset(&self, index: u32) -> u64 {
        index as u64 * self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_rounds_up() {
        let m = ChunkManifest::new(12 * 1024 * 1024, 5 * 1024 * 1024, 200, "video/mp4".into());
        assert_eq!(m.chunk_count, 3);
    }

    #[test]
    fn exact_multiple_does_not_add_extra_chunk() {
        let m = ChunkManifest::new(10 * 1024 * 1024, 5 * 1024 * 1024, 200, "video/mp4".into());
        assert_eq!(m.chunk_count, 2);
    }

    #[test]
    fn chunk_range_for_covers_minimal_span() {
        let m = ChunkManifest::new(20 * 1024 * 1024, 5 * 1024 * 1024, 200, "video/mp4".into());
        let (first, last) = m.chunk_range_for(6 * 1024 * 1024, 11 * 1024 * 1024);
        assert_eq!(first, 1);
        assert_eq!(last, 2);
    }

    #[test]
    fn chunk_key_is_namespaced_under_base() {
        let m = ChunkManifest::new(1, 5 * 1024 * 1024, 200, "video/mp4".into());
        assert_eq!(m.chunk_key("video:foo", 2), "video:foo::chunk::2");
    }
}
