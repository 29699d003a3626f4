//! Error taxonomy for the edge proxy.
//!
//! Mirrors the kinds-not-classes taxonomy of the source specification:
//! each variant maps to a single HTTP status and a stable machine-readable
//! code so the client sees a small, predictable error body. Lower layers
//! (KV, object store, HTTP) convert their I/O errors into one of these
//! kinds at the boundary; nothing below the dispatcher invents a new kind.

use std::fmt;

/// Centralized error type for the edge proxy.
///
/// The dispatcher (C5) is the only component that decides failover vs.
/// user-visible failure; every other component either resolves its own
/// error or returns one of these variants for the dispatcher/orchestrator
/// to act on.
#[derive(Debug, Clone)]
pub enum ProxyError {
    /// Invalid or missing configuration. Fatal for the affected request;
    /// the configuration manager falls back to the previous valid snapshot.
    Config(String),

    /// No origin matcher matched the request path.
    Resolution(String),

    /// All sources for a matched origin were exhausted without finding
    /// the object.
    SourceNotFound(String),

    /// A source rejected the request due to bad or missing credentials.
    SourceUnauthorized(String),

    /// A source rejected the request due to a policy/permission failure.
    SourceForbidden(String),

    /// Transformer returned a transient failure (5xx, or a
    /// transformer-specific transient code). Triggers failover.
    TransformerTransient { status: u16, detail: String },

    /// Transformer returned a permanent failure (4xx) after the
    /// parameter-remap retry was attempted or did not apply.
    TransformerPermanent { status: u16, detail: String },

    /// The requested byte range could not be satisfied against the
    /// artifact's total size.
    RangeUnsatisfiable { total_size: u64 },

    /// The client disconnected before a response was produced. Not a
    /// real error: never logged as one, never surfaced to metrics as a
    /// failure.
    ClientDisconnect,

    /// Unrecoverable internal error. Always logged with full context,
    /// never cached.
    Internal(String),
}

impl ProxyError {
    /// HTTP status this error maps to when sent to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::Config(_) => 500,
            ProxyError::Resolution(_) => 404,
            ProxyError::SourceNotFound(_) => 404,
            ProxyError::SourceUnauthorized(_) => 502,
            ProxyError::SourceForbidden(_) => 502,
            ProxyError::TransformerTransient { .. } => 502,
            ProxyError::TransformerPermanent { status, .. } => *status,
            ProxyError::RangeUnsatisfiable { .. } => 416,
            ProxyError::ClientDisconnect => 499,
            ProxyError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Config(_) => "config_error",
            ProxyError::Resolution(_) => "no_matching_origin",
            ProxyError::SourceNotFound(_) => "source_not_found",
            ProxyError::SourceUnauthorized(_) => "source_unauthorized",
            ProxyError::SourceForbidden(_) => "source_forbidden",
            ProxyError::TransformerTransient { .. } => "transformer_unavailable",
            ProxyError::TransformerPermanent { .. } => "transformer_rejected_request",
            ProxyError::RangeUnsatisfiable { .. } => "range_unsatisfiable",
            ProxyError::ClientDisconnect => "client_disconnect",
            ProxyError::Internal(_) => "internal_error",
        }
    }

    /// Whether this error is retryable from the client's point of view,
    /// and thus should carry a `Retry-After` hint.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ProxyError::TransformerTransient { .. } => Some(5),
            ProxyError::SourceUnauthorized(_) | ProxyError::SourceForbidden(_) => None,
            _ => None,
        }
    }

    /// Whether the cache layers should treat this as "serve via producer,
    /// never surface to the client as a cache error." Cache read/write
    /// errors never reach this type; this flag is for the orchestrator's
    /// own bookkeeping about whether a response body should be cached.
    pub fn is_cacheable_outcome(&self) -> bool {
        !matches!(self, ProxyError::Internal(_) | ProxyError::ClientDisconnect)
    }

    /// Render the small text/JSON body described in the error handling
    /// design: a stable code plus a human message.
    pub fn to_client_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        })
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Config(msg) => write!(f, "configuration error: {msg}"),
            ProxyError::Resolution(msg) => write!(f, "no origin matched: {msg}"),
            ProxyError::SourceNotFound(msg) => write!(f, "source exhausted: {msg}"),
            ProxyError::SourceUnauthorized(msg) => write!(f, "source rejected credentials: {msg}"),
            ProxyError::SourceForbidden(msg) => write!(f, "source denied by policy: {msg}"),
            ProxyError::TransformerTransient { status, detail } => {
                write!(f, "transformer transient failure ({status}): {detail}")
            }
            ProxyError::TransformerPermanent { status, detail } => {
                write!(f, "transformer rejected request ({status}): {detail}")
            }
            ProxyError::RangeUnsatisfiable { total_size } => {
                write!(f, "range unsatisfiable against {total_size} total bytes")
            }
            ProxyError::ClientDisconnect => write!(f, "client disconnected"),
            ProxyError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ProxyError {}
