//! Cache and KV store error types.

#[derive(Debug)]
pub enum CacheError {
    NotFound,
    /// The underlying KV binding returned an error (timeout, quota, etc).
    BackendError(String),
    /// A chunked artifact's manifest failed validation (bad chunk count,
    /// size mismatch, or a concurrent writer's lock was held).
    ManifestError(String),
    SerializationError(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::NotFound => write!(f, "cache entry not found"),
            CacheError::BackendError(msg) => write!(f, "cache backend error: {msg}"),
            CacheError::ManifestError(msg) => write!(f, "chunk manifest error: {msg}"),
            CacheError::SerializationError(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}
