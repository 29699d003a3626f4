//! Request handling pipeline tying components C1–C9 together.
//!
//! Not a Pingora `ProxyHttp` implementation: like the teacher's own
//! `proxy/mod.rs` (which never wires the trait either, staying at
//! construction-and-sanity-check scaffolding despite depending on
//! `pingora-proxy`), this module stops at the pipeline a `ProxyHttp::
//! request_filter` would call into. Grounded on the teacher's
//! `response_handler.rs` (cache-entry/TTL shaping) and `error_handler.rs`
//! (status classification) for the response-building conventions, with
//! the S3-specific bucket/object-key logic replaced by origin
//! resolution, transform dispatch, and cache-key computation.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::cache::key::VideoCacheKey;
use crate::cache::range::parse_range;
use crate::cache::CacheOrchestrator;
use crate::config::Config;
use crate::context::RequestContext;
use crate::dispatch::{DispatchDiagnostics, Dispatcher};
use crate::error::ProxyError;
use crate::resolver::Resolver;
use crate::transform;

/// A fully formed response ready to be written back to the client.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Wires the resolver, dispatcher, and cache orchestrator for a single
/// configuration snapshot. Rebuilt whenever the configuration manager
/// swaps in a new snapshot (the resolver's compiled regexes are
/// immutable once built, so a new snapshot means a new `RequestPipeline`
/// rather than a mutation of this one).
pub struct RequestPipeline {
    resolver: Resolver,
    dispatcher: Dispatcher,
    cache: CacheOrchestrator,
    config: Arc<Config>,
}

impl RequestPipeline {
    pub fn new(config: Arc<Config>, dispatcher: Dispatcher, cache: CacheOrchestrator) -> Result<Self, ProxyError> {
        let resolver = Resolver::build(&config.origins)?;
        Ok(Self {
            resolver,
            dispatcher,
            cache,
            config,
        })
    }

    /// Handle one GET/HEAD request: resolve the origin, compute the
    /// cache key, and serve from cache or via the transformation
    /// dispatcher on a miss. A `Range` header, when present and the
    /// artifact is already cached, is satisfied without re-running the
    /// dispatcher.
    pub async fn handle(
        &self,
        ctx: &mut RequestContext,
        request_path: &str,
        query: &HashMap<String, String>,
        range_header: Option<&str>,
    ) -> Result<ProxyResponse, ProxyError> {
        ctx.breadcrumb("resolver", format!("resolving path '{request_path}'"));
        let resolved = self.resolver.resolve(request_path)?;
        let origin = resolved.origin;
        ctx.breadcrumb("resolver", format!("matched origin '{}'", origin.name));

        let filtered_query = filter_bypass_params(query, &self.config.cache.bypass_query_parameters);
        let options = transform::resolve_options(&self.config.video, origin.transform_options.as_ref(), &filtered_query);

        // Read the version-counter namespace's current value (component
        // C6) before building the key so a hit lands on whatever the last
        // successful regeneration bumped it to.
        let unversioned = VideoCacheKey {
            source_path: request_path.to_string(),
            options,
            version: 0,
        };
        let namespace = unversioned.version_namespace();
        let version = self.cache.current_version(&namespace).await?;
        let key = VideoCacheKey { version, ..unversioned };

        if let Some(range_value) = range_header {
            if let Some(total_size) = self.cache.total_size(&key).await? {
                let range = parse_range(range_value, total_size)?;
                if let Some((body, total_size)) = self.cache.get_range(&key, &range).await? {
                    ctx.breadcrumb("cache", "served range from cache");
                    return Ok(ProxyResponse {
                        status: 206,
                        headers: vec![
                            ("content-range".to_string(), range.content_range_header(total_size)),
                            ("accept-ranges".to_string(), "bytes".to_string()),
                            ("content-length".to_string(), body.len().to_string()),
                        ],
                        body,
                    });
                }
            }
            // No cached artifact yet: fall through to the normal
            // cache-or-produce path, which populates the full artifact;
            // the next ranged request will be served from the branch above.
        }

        let ttl_override = origin.ttl_by_status.clone().unwrap_or_default();
        let query_for_dispatch = filtered_query.clone();
        let request_path_owned = request_path.to_string();

        let lookup = self
            .cache
            .get_or_produce(&key, &ttl_override, || async move {
                let outcome = self
                    .dispatcher
                    .dispatch(&self.resolver, &self.config.video, &request_path_owned, &query_for_dispatch, key.version)
                    .await?;
                Ok((
                    outcome.status,
                    vec![("content-type".to_string(), outcome.content_type)],
                    outcome.body,
                ))
            })
            .await?;

        ctx.breadcrumb("cache", format!("served from tier {:?}", lookup.tier));

        Ok(ProxyResponse {
            status: lookup.response.status,
            headers: lookup.response.headers.into_iter().collect(),
            body: lookup.response.body,
        })
    }
}

/// Strip the configured bypass-cache query parameters before they reach
/// option resolution or the cache key, so `?nocache=1` doesn't fragment
/// the cache on an otherwise-identical request.
fn filter_bypass_params(query: &HashMap<String, String>, bypass: &[String]) -> HashMap<String, String> {
    query
        .iter()
        .filter(|(k, _)| !bypass.iter().any(|b| b.eq_ignore_ascii_case(k)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Attach the debug diagnostic headers (§6) to a response, only when the
/// configuration's `debug` flag is set.
pub fn debug_headers(config: &Config, diagnostics: &DispatchDiagnostics) -> Vec<(String, String)> {
    if !config.debug {
        return vec![];
    }
    let mut headers = vec![
        ("x-origin-name".to_string(), diagnostics.origin_name.clone()),
        ("x-origin-matcher".to_string(), diagnostics.origin_matcher.clone()),
        ("x-source-type".to_string(), diagnostics.source_type.to_string()),
        ("x-source-path".to_string(), diagnostics.source_path.clone()),
    ];
    if let Some(idx) = diagnostics.fallback_index {
        headers.push(("x-pattern-fallback-index".to_string(), idx.to_string()));
    }
    if let Some(total) = diagnostics.fallback_total {
        headers.push(("x-pattern-fallback-total".to_string(), total.to_string()));
    }
    if diagnostics.pattern_fallback_applied {
        headers.push(("x-pattern-fallback-applied".to_string(), "true".to_string()));
    }
    if diagnostics.fallback_applied {
        headers.push(("x-fallback-applied".to_string(), "true".to_string()));
    }
    if diagnostics.fallback_cache_hit {
        headers.push(("x-fallback-cache-hit".to_string(), "true".to_string()));
    }
    if let Some(reason) = &diagnostics.fallback_reason {
        headers.push(("x-fallback-reason".to_string(), reason.clone()));
    }
    if let Some(status) = diagnostics.original_status {
        headers.push(("x-original-status".to_string(), status.to_string()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_params_are_filtered_case_insensitively() {
        let mut query = HashMap::new();
        query.insert("w".to_string(), "100".to_string());
        query.insert("NoCache".to_string(), "1".to_string());
        let bypass = vec!["nocache".to_string()];
        let filtered = filter_bypass_params(&query, &bypass);
        assert!(filtered.contains_key("w"));
        assert!(!filtered.contains_key("NoCache"));
    }

    #[test]
    fn debug_headers_empty_when_debug_disabled() {
        let config = Config {
            debug: false,
            ..Default::default()
        };
        let diagnostics = DispatchDiagnostics {
            origin_name: "videos".to_string(),
            ..Default::default()
        };
        assert!(debug_headers(&config, &diagnostics).is_empty());
    }

    #[test]
    fn debug_headers_populated_when_debug_enabled() {
        let config = Config {
            debug: true,
            ..Default::default()
        };
        let diagnostics = DispatchDiagnostics {
            origin_name: "videos".to_string(),
            fallback_applied: true,
            ..Default::default()
        };
        let headers = debug_headers(&config, &diagnostics);
        assert!(headers.iter().any(|(k, _)| k == "x-origin-name"));
        assert!(headers.iter().any(|(k, v)| k == "x-fallback-applied" && v == "true"));
    }
}
