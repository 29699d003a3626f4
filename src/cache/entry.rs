//! Cached response entry, stored in both the edge HTTP cache tier and
//! serialized as the non-chunked KV record body.
//!
//! Grounded on the teacher's `CacheEntry` (`created_at`/`expires_at`/
//! `is_expired`/`touch` pattern); generalized from a single S3 object's
//! metadata to an arbitrary HTTP response (status, headers, body) since
//! a cached entry here is the transformer's or fallback's full response,
//! not a raw object fetch.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An HTTP response cached at a [`crate::cache::key::VideoCacheKey`].
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl CachedResponse {
    pub fn new(status: u16, headers: HashMap<String, String>, body: Bytes, ttl: Duration) -> Self {
        let now = SystemTime::now();
        Self {
            status,
            headers,
            body,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Fraction of the entry's TTL that has elapsed, used by the
    /// TTL-refresh-on-read policy.
    pub fn age_ratio(&self) -> f64 {
        let total = self
            .expires_at
            .duration_since(self.created_at)
            .unwrap_or(Duration::from_secs(1))
            .as_secs_f64();
        if total <= 0.0 {
            return 1.0;
        }
        let elapsed = SystemTime::now()
            .duration_since(self.created_at)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        (elapsed / total).min(1.0)
    }

    pub fn size_bytes(&self) -> usize {
        self.body.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

/// Serializable form of [`CachedResponse`] for KV persistence, where
/// `SystemTime` doesn't round-trip through JSON directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    #[serde(with = "serde_bytes_base64")]
    pub body: Vec<u8>,
    pub created_at_unix: u64,
    pub ttl_secs: u64,
    /// Body length recorded at write time. Checked against the
    /// deserialized body's actual length on every read, so storage-layer
    /// corruption (a truncated or otherwise mismatched write) is treated
    /// as a miss instead of being served.
    pub actual_total_video_size: u64,
}

impl StoredResponse {
    pub fn is_corrupted(&self) -> bool {
        self.body.len() as u64 != self.actual_total_video_size
    }
}

impl From<&CachedResponse> for StoredResponse {
    fn from(r: &CachedResponse) -> Self {
        let created_at_unix = r
            .created_at
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let ttl_secs = r
            .expires_at
            .duration_since(r.created_at)
            .unwrap_or_default()
            .as_secs();
        Self {
            status: r.status,
            headers: r.headers.clone(),
            body: r.body.to_vec(),
            created_at_unix,
            ttl_secs,
            actual_total_video_size: r.body.len() as u64,
        }
    }
}

impl From<StoredResponse> for CachedResponse {
    fn from(s: StoredResponse) -> Self {
        let created_at = std::time::UNIX_EPOCH + Duration::from_secs(s.created_at_unix);
        Self {
            status: s.status,
            headers: s.headers,
            body: Bytes::from(s.body),
            created_at,
            expires_at: created_at + Duration::from_secs(s.ttl_secs),
        }
    }
}

mod serde_bytes_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        base64::engine::general_purpose::STANDARD
            .encode(bytes)
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
