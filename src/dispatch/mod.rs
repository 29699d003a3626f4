//! Transformation dispatch and failover (§4.5, component C5).
//!
//! Walks the origins matching a request path in priority order, posting
//! each candidate's fetched source bytes to the transformation service;
//! on a transient failure advances to the next matching origin, and on
//! total exhaustion falls back to serving the primary origin's
//! untransformed bytes. Grounded on the teacher's `retry`/
//! `circuit_breaker` failure classification style, generalized here into
//! a response-status classifier rather than a single retry predicate,
//! since 4xx, 5xx, and "retry with different params" are three distinct
//! outcomes instead of one retriable/non-retriable split.
//!
//! **Design note on `resolved_source_url`.** The source specification
//! composes `<service_base>/<opts>/<resolved_source_url>` and dispatches
//! it, implying the transformer fetches the source itself. This crate
//! instead has the dispatcher fetch the source through C4 first and
//! `POST`s the bytes to the transformation service, because an
//! `ObjectStore` source has no URL a transformer process could reach
//! independently, and because request-body dispatch composes cleanly
//! with the existing `reqwest` client rather than requiring every
//! `Remote`/`Fallback` source to be rewritten into a presigned,
//! transformer-fetchable URL. `resolved_source_url`'s path segment is
//! kept in the URL for cache-key/observability parity with the spec's
//! grammar; it no longer needs to be independently fetchable.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::cache::key::fallback_key_for;
use crate::config::video::VideoConfig;
use crate::error::ProxyError;
use crate::kv::chunk_store::ChunkStore;
use crate::kv::PersistentKv;
use crate::resolver::{ordered_sources, Resolver};
use crate::source::SourceFetcher;
use crate::transform::{self, remap};

/// Diagnostic headers a caller may choose to attach to the client
/// response when `debug` is enabled (§6 External Interfaces).
#[derive(Debug, Clone, Default)]
pub struct DispatchDiagnostics {
    pub origin_name: String,
    pub origin_matcher: String,
    pub source_type: &'static str,
    pub source_path: String,
    pub fallback_index: Option<u32>,
    pub fallback_total: Option<u32>,
    pub pattern_fallback_applied: bool,
    pub fallback_applied: bool,
    pub fallback_cache_hit: bool,
    pub fallback_reason: Option<String>,
    pub original_status: Option<u16>,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
    pub diagnostics: DispatchDiagnostics,
}

pub struct Dispatcher {
    source_fetcher: Arc<SourceFetcher>,
    http: reqwest::Client,
    /// Durable cache for fallback artifacts (§3 "fallback artifacts use a
    /// distinct key suffix"), keyed by [`fallback_key_for`] rather than
    /// the request's full `VideoCacheKey`, so repeated failures for the
    /// same source share one cached original regardless of which
    /// derivative was requested.
    fallback_cache: ChunkStore,
}

impl Dispatcher {
    pub fn new(source_fetcher: Arc<SourceFetcher>, kv: Arc<dyn PersistentKv>) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            source_fetcher,
            http,
            fallback_cache: ChunkStore::new(kv),
        })
    }

    /// Extension-based passthrough check (§4.5 "Passthrough"): requests
    /// whose path extension is whitelisted skip transformation entirely.
    fn is_passthrough(video: &VideoConfig, request_path: &str) -> bool {
        let ext = request_path.rsplit('.').next().unwrap_or("");
        video.passthrough.allows(ext)
    }

    pub async fn dispatch(
        &self,
        resolver: &Resolver,
        video: &VideoConfig,
        request_path: &str,
        query: &HashMap<String, String>,
        version: u64,
    ) -> Result<DispatchOutcome, ProxyError> {
        let matches = resolver.resolve_all(request_path)?;

        if Self::is_passthrough(video, request_path) {
            let primary = &matches[0];
            let source = ordered_sources(primary.origin)
                .into_iter()
                .next()
                .ok_or_else(|| ProxyError::SourceNotFound(format!("origin '{}' has no sources", primary.origin.name)))?;
            let resp = self
                .source_fetcher
                .fetch(primary.origin, &primary.captures, request_path)
                .await?;
            return Ok(DispatchOutcome {
                status: resp.status,
                content_type: resp.content_type,
                body: resp.body,
                diagnostics: DispatchDiagnostics {
                    origin_name: primary.origin.name.clone(),
                    origin_matcher: primary.origin.matcher.clone(),
                    source_type: source.kind(),
                    source_path: source.path_template().to_string(),
                    ..Default::default()
                },
            });
        }

        let total = matches.len() as u32;
        let mut last_transient: Option<ProxyError> = None;

        for (idx, resolved) in matches.iter().enumerate() {
            let origin = resolved.origin;
            let mut options = transform::resolve_options(video, origin.transform_options.as_ref(), query);

            let source_resp = match self.source_fetcher.fetch(origin, &resolved.captures, request_path).await {
                Ok(r) => r,
                Err(e) => {
                    last_transient = Some(e);
                    continue;
                }
            };

            let source = ordered_sources(origin).into_iter().next();
            let source_path = source.map(|s| s.path_template().to_string()).unwrap_or_default();
            let source_kind = source.map(|s| s.kind()).unwrap_or("unknown");

            let mut attempted_remap = false;
            loop {
                let url = transform::build_dispatch_url(
                    &video.service_base,
                    video,
                    &options,
                    &crate::resolver::expand_template(&source_path, &resolved.captures, request_path),
                    version,
                );

                let result = self
                    .http
                    .post(&url)
                    .header("content-type", source_resp.content_type.clone())
                    .body(source_resp.body.clone())
                    .send()
                    .await;

                let response = match result {
                    Ok(r) => r,
                    Err(e) => {
                        last_transient = Some(ProxyError::TransformerTransient {
                            status: 502,
                            detail: format!("transform dispatch failed: {e}"),
                        });
                        break;
                    }
                };

                let status = response.status().as_u16();
                if (200..300).contains(&status) {
                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("video/mp4")
                        .to_string();
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| ProxyError::Internal(format!("failed to read transform response: {e}")))?;

                    return Ok(DispatchOutcome {
                        status,
                        content_type,
                        body,
                        diagnostics: DispatchDiagnostics {
                            origin_name: origin.name.clone(),
                            origin_matcher: origin.matcher.clone(),
                            source_type: source_kind,
                            source_path,
                            fallback_index: (idx > 0).then_some(idx as u32),
                            fallback_total: (idx > 0).then_some(total),
                            pattern_fallback_applied: idx > 0,
                            ..Default::default()
                        },
                    });
                }

                if (400..500).contains(&status) && !attempted_remap {
                    attempted_remap = true;
                    if remap::strip_offending_params(status, &mut options) {
                        continue;
                    }
                    return Err(ProxyError::TransformerPermanent {
                        status,
                        detail: format!("transformer rejected request with status {status}"),
                    });
                }
                if (400..500).contains(&status) {
                    return Err(ProxyError::TransformerPermanent {
                        status,
                        detail: format!("transformer rejected request with status {status}"),
                    });
                }

                last_transient = Some(ProxyError::TransformerTransient {
                    status,
                    detail: format!("transformer returned {status}"),
                });
                break;
            }
        }

        // §4.5 step 5: all origins exhausted, fall back to the primary
        // origin's untransformed bytes.
        self.fallback(&matches[0], request_path, last_transient).await
    }

    /// Serve the primary origin's untransformed bytes, consulting the
    /// distinct fallback-key cache first so repeated failures for the same
    /// source don't re-fetch it on every request.
    async fn fallback(
        &self,
        primary: &crate::resolver::ResolvedOrigin<'_>,
        request_path: &str,
        reason: Option<ProxyError>,
    ) -> Result<DispatchOutcome, ProxyError> {
        let original_status = match &reason {
            Some(ProxyError::TransformerTransient { status, .. }) => Some(*status),
            _ => None,
        };
        let fallback_key = fallback_key_for(request_path);

        if let Some(cached) = self
            .fallback_cache
            .get(&fallback_key)
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))?
        {
            let content_type = cached
                .headers
                .get("content-type")
                .cloned()
                .unwrap_or_else(|| "application/octet-stream".to_string());
            return Ok(DispatchOutcome {
                status: cached.status,
                content_type,
                body: cached.body,
                diagnostics: DispatchDiagnostics {
                    origin_name: primary.origin.name.clone(),
                    origin_matcher: primary.origin.matcher.clone(),
                    source_type: "fallback",
                    source_path: request_path.to_string(),
                    fallback_applied: true,
                    fallback_cache_hit: true,
                    fallback_reason: reason.map(|e| e.to_string()),
                    original_status,
                    ..Default::default()
                },
            });
        }

        let resp = self
            .source_fetcher
            .fetch(primary.origin, &primary.captures, request_path)
            .await?;

        self.fallback_cache
            .put(&fallback_key, resp.status, resp.content_type.clone(), resp.body.clone())
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))?;

        Ok(DispatchOutcome {
            status: resp.status,
            content_type: resp.content_type,
            body: resp.body,
            diagnostics: DispatchDiagnostics {
                origin_name: primary.origin.name.clone(),
                origin_matcher: primary.origin.matcher.clone(),
                source_type: "fallback",
                source_path: request_path.to_string(),
                fallback_applied: true,
                fallback_cache_hit: false,
                fallback_reason: reason.map(|e| e.to_string()),
                original_status,
                ..Default::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::origin::{OriginConfig, SourceConfig};
    use crate::config::video::PassthroughConfig;
    use crate::kv::InMemoryKv;
    use crate::source::object_store::{InMemoryObjectStore, ObjectStoreRegistry};

    fn test_kv() -> Arc<dyn PersistentKv> {
        Arc::new(InMemoryKv::new())
    }

    fn passthrough_origin() -> OriginConfig {
        OriginConfig {
            name: "videos".to_string(),
            matcher: r"^/v/(?P<id>\w+\.\w+)$".to_string(),
            capture_group_names: vec!["id".to_string()],
            sources: vec![SourceConfig::ObjectStore {
                binding_name: "VIDEOS".to_string(),
                path_template: "videos/${id}".to_string(),
                priority: 1,
            }],
            ttl_by_status: None,
            transform_options: None,
            quality: None,
            compression: None,
            retry: None,
            circuit_breaker: None,
        }
    }

    fn video_config_with_passthrough() -> VideoConfig {
        VideoConfig {
            derivatives: HashMap::new(),
            defaults: Default::default(),
            passthrough: PassthroughConfig {
                enabled: true,
                whitelisted_formats: vec!["gif".to_string()],
            },
            prefer_derivative_over_responsive: false,
            service_base: "https://transform.example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn passthrough_requests_skip_transformation() {
        let store = InMemoryObjectStore::new();
        store.put("videos/a.gif", "image/gif", Bytes::from_static(b"gifdata"));
        let mut registry = ObjectStoreRegistry::new();
        registry.register("VIDEOS", Arc::new(store));

        let fetcher = Arc::new(SourceFetcher::new(registry).unwrap());
        let dispatcher = Dispatcher::new(fetcher, test_kv()).unwrap();
        let resolver = Resolver::build(&[passthrough_origin()]).unwrap();
        let video = video_config_with_passthrough();

        let outcome = dispatcher
            .dispatch(&resolver, &video, "/v/a.gif", &HashMap::new(), 1)
            .await
            .unwrap();
        assert_eq!(outcome.body, Bytes::from_static(b"gifdata"));
        assert!(!outcome.diagnostics.fallback_applied);
    }

    #[tokio::test]
    async fn no_matching_origin_is_a_resolution_error() {
        let fetcher = Arc::new(SourceFetcher::new(ObjectStoreRegistry::new()).unwrap());
        let dispatcher = Dispatcher::new(fetcher, test_kv()).unwrap();
        let resolver = Resolver::build(&[passthrough_origin()]).unwrap();
        let video = video_config_with_passthrough();

        let err = dispatcher
            .dispatch(&resolver, &video, "/nope", &HashMap::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Resolution(_)));
    }

    #[tokio::test]
    async fn falls_back_to_original_when_source_unreachable_for_non_passthrough() {
        // Non-passthrough origin whose object store binding is unregistered:
        // the transform path never even gets a source to POST, so this
        // exercises the final fallback path's own error propagation.
        let mut origin = passthrough_origin();
        origin.matcher = r"^/x/(?P<id>\w+\.\w+)$".to_string();
        let video = VideoConfig {
            service_base: "https://transform.example.com".to_string(),
            ..video_config_with_passthrough()
        };
        let video = VideoConfig {
            passthrough: PassthroughConfig::default(),
            ..video
        };

        let fetcher = Arc::new(SourceFetcher::new(ObjectStoreRegistry::new()).unwrap());
        let dispatcher = Dispatcher::new(fetcher, test_kv()).unwrap();
        let resolver = Resolver::build(&[origin]).unwrap();

        let err = dispatcher
            .dispatch(&resolver, &video, "/x/a.mp4", &HashMap::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[tokio::test]
    async fn repeated_fallback_is_served_from_the_fallback_cache() {
        // A transform service base that refuses the connection, so every
        // dispatch for this origin exhausts into the fallback path.
        let store = InMemoryObjectStore::new();
        store.put("videos/broken.mp4", "video/mp4", Bytes::from_static(b"original bytes"));
        let mut registry = ObjectStoreRegistry::new();
        registry.register("VIDEOS", Arc::new(store));

        let mut origin = passthrough_origin();
        origin.matcher = r"^/x/(?P<id>\w+\.\w+)$".to_string();
        let resolver = Resolver::build(&[origin]).unwrap();
        let video = VideoConfig {
            service_base: "http://127.0.0.1:1".to_string(),
            passthrough: PassthroughConfig::default(),
            ..video_config_with_passthrough()
        };

        let fetcher = Arc::new(SourceFetcher::new(registry).unwrap());
        let dispatcher = Dispatcher::new(fetcher, test_kv()).unwrap();

        let first = dispatcher
            .dispatch(&resolver, &video, "/x/broken.mp4", &HashMap::new(), 1)
            .await
            .unwrap();
        assert!(first.diagnostics.fallback_applied);
        assert!(!first.diagnostics.fallback_cache_hit);
        assert_eq!(first.body, Bytes::from_static(b"original bytes"));

        let second = dispatcher
            .dispatch(&resolver, &video, "/x/broken.mp4", &HashMap::new(), 1)
            .await
            .unwrap();
        assert!(second.diagnostics.fallback_applied);
        assert!(second.diagnostics.fallback_cache_hit);
        assert_eq!(second.body, Bytes::from_static(b"original bytes"));
    }
}
