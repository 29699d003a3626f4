// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// KV chunk store (C1)
// =============================================================================

/// Artifacts at or below this size are stored as a single KV entry.
pub const SINGLE_ENTRY_MAX_BYTES: u64 = 20 * 1024 * 1024;

/// Size of each chunk for artifacts above `SINGLE_ENTRY_MAX_BYTES`.
/// Must be a power-of-two multiple of 1 MiB; readers accept any value
/// recorded in the manifest to allow this to change over time.
pub const STANDARD_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum size a manifest record may occupy so it can always be loaded
/// in a single KV read.
pub const MAX_MANIFEST_METADATA_BYTES: usize = 8 * 1024;

/// TTL of the chunk-write lock record.
pub const CHUNK_LOCK_TTL_SECS: u64 = 30;

// =============================================================================
// Cache orchestrator / TTL policy (C2, C7)
// =============================================================================

/// Default TTL for 2xx responses, seconds.
pub const DEFAULT_TTL_OK_SECS: u64 = 86_400;
/// Default TTL for 3xx responses, seconds.
pub const DEFAULT_TTL_REDIRECT_SECS: u64 = 3_600;
/// Default TTL for 4xx responses, seconds.
pub const DEFAULT_TTL_CLIENT_ERROR_SECS: u64 = 60;
/// Default TTL for 5xx responses, seconds.
pub const DEFAULT_TTL_SERVER_ERROR_SECS: u64 = 10;

/// Short TTL applied to bounded fallback-to-original caching (C5).
pub const FALLBACK_TTL_SECS: u64 = 30;

/// Fraction of TTL remaining below which a read triggers an async
/// TTL-refresh re-put.
pub const DEFAULT_TTL_REFRESH_RATIO: f64 = 0.1;

/// Maximum number of waiters coalesced behind one in-flight producer
/// call before new callers invoke the producer independently.
pub const MAX_COALESCE_WAITERS: usize = 64;

/// Bound on the in-process edge HTTP cache tier (entry count).
pub const EDGE_CACHE_MAX_ENTRIES: u64 = 10_000;

// =============================================================================
// Presigned URL cache (C4)
// =============================================================================

/// Safety margin subtracted from a presigned URL's advertised expiry
/// before it is considered stale internally.
pub const PRESIGN_SAFETY_MARGIN_SECS: u64 = 5 * 60;

/// Maximum number of presigned URLs cached at once (LRU eviction beyond
/// this bound).
pub const PRESIGN_CACHE_MAX_ENTRIES: u64 = 5_000;

// =============================================================================
// Request context (C8)
// =============================================================================

/// Default maximum breadcrumbs retained per request.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 25;
/// Hard ceiling on configurable breadcrumb capacity.
pub const MAX_BREADCRUMBS_CEILING: usize = 100;

// =============================================================================
// Bypass query parameters (default set, §6)
// =============================================================================

pub const DEFAULT_BYPASS_QUERY_PARAMS: &[&str] = &["debug", "nocache", "bypass"];

// =============================================================================
// Cache-key dimension bucketing
// =============================================================================

/// Dimensions are rounded to the nearest multiple of this value when
/// computing a cache key, to maximize hits across near-identical
/// responsive requests.
pub const DIMENSION_BUCKET: u32 = 10;

// =============================================================================
// Source fetch retry / circuit breaker (C4)
// =============================================================================

/// Default maximum retry attempts (including the initial attempt) when
/// fetching from a Remote or Fallback source.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Initial exponential-backoff delay between source fetch retries, ms.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;
/// Backoff ceiling between source fetch retries, ms.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 1_000;

/// Consecutive failures before a per-origin circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Consecutive half-open successes required to close the circuit.
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;
/// Time an open circuit waits before probing again, seconds.
pub const DEFAULT_CB_TIMEOUT_SECS: u64 = 30;
/// Maximum concurrent probe requests allowed while half-open.
pub const DEFAULT_HALF_OPEN_MAX_REQUESTS: u32 = 1;
