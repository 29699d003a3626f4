//! Transform option resolution and dispatch URL construction (§3
//! TransformOptions, §4.5, §4.6, component C6).
//!
//! Resolves a request's effective transform options from three layers,
//! highest priority first: request query parameters, the matched
//! origin's `transform_options` overlay, and the global video defaults.
//! A named `derivative` and explicit responsive hints (`imwidth`/
//! `imheight`) are mutually exclusive in the *cache key* — which one
//! wins is controlled by `video.defaults.prefer_derivative_over_responsive`
//! (Open Question 1, resolved in `DESIGN.md`) — but both may still need
//! their own dimensions when building the actual dispatch URL.

pub mod remap;

use std::collections::HashMap;

use crate::cache::key::TransformOptions;
use crate::config::origin::OriginTransformOverlay;
use crate::config::video::{DerivativeConfig, VideoConfig};

/// Resolve the effective [`TransformOptions`] for a request.
///
/// `query` holds the request's raw query parameters (already stripped of
/// bypass-cache flags by the caller). Recognized keys: `derivative`,
/// `imwidth`, `imheight`, `w`, `h`, `q`, `c`, `f`, `mode`.
pub fn resolve_options(
    video: &VideoConfig,
    origin_overlay: Option<&OriginTransformOverlay>,
    query: &HashMap<String, String>,
) -> TransformOptions {
    let mut options = TransformOptions::default();

    let derivative_name = query.get("derivative").cloned();
    let derivative_cfg = derivative_name.as_deref().and_then(|name| video.derivatives.get(name));

    let has_responsive_hint = query.contains_key("imwidth") || query.contains_key("imheight");

    if let Some(name) = &derivative_name {
        if video.derivatives.contains_key(name) {
            let keep_derivative = !has_responsive_hint || video.prefer_derivative_over_responsive;
            if keep_derivative {
                options.derivative = Some(name.clone());
            }
        }
    }

    options.imwidth = parse_u32(query.get("imwidth"));
    options.imheight = parse_u32(query.get("imheight"));
    if options.derivative.is_some() && !video.prefer_derivative_over_responsive {
        // A kept derivative with no responsive hint present: leave dims unset,
        // they're implied by the derivative name in the key.
    } else if options.derivative.is_some() {
        // prefer_derivative_over_responsive: derivative wins outright, drop
        // any responsive hints that would otherwise also enter the key.
        options.imwidth = None;
        options.imheight = None;
    }

    options.width = parse_u32(query.get("w"));
    options.height = parse_u32(query.get("h"));

    options.quality = resolve_string(query.get("q"), derivative_cfg.and_then(|d| d.quality.as_ref()), origin_overlay.and_then(|o| o.quality.as_ref()), video.defaults.quality.as_ref());
    options.compression = resolve_string(query.get("c"), derivative_cfg.and_then(|d| d.compression.as_ref()), origin_overlay.and_then(|o| o.compression.as_ref()), video.defaults.compression.as_ref());
    options.format = resolve_string(query.get("f"), derivative_cfg.and_then(|d| d.format.as_ref()), origin_overlay.and_then(|o| o.format.as_ref()), video.defaults.format.as_ref());
    options.mode = resolve_string(query.get("mode"), derivative_cfg.and_then(|d| d.mode.as_ref()), origin_overlay.and_then(|o| o.mode.as_ref()), video.defaults.mode.as_ref());

    options
}

fn parse_u32(v: Option<&String>) -> Option<u32> {
    v.and_then(|s| s.parse().ok())
}

fn resolve_string(
    request: Option<&String>,
    derivative: Option<&String>,
    origin: Option<&String>,
    default: Option<&String>,
) -> Option<String> {
    request.or(derivative).or(origin).or(default).cloned()
}

/// Look up a selected derivative's own dimensions, used when building the
/// dispatch URL (the transformer needs concrete numbers, not a preset
/// name) rather than the cache key (which keeps the preset name opaque).
pub fn derivative_dimensions<'a>(video: &'a VideoConfig, options: &TransformOptions) -> Option<&'a DerivativeConfig> {
    options.derivative.as_deref().and_then(|name| video.derivatives.get(name))
}

/// Build the transformation service dispatch URL per the grammar
/// `<service_base>/<kv-pair-segment>/<resolved_source_url>[?v=<n>]`.
///
/// The kv-pair segment carries concrete, transformer-understandable
/// values: a selected derivative's width/height are expanded inline
/// rather than passed as a preset name, since the transformer itself has
/// no notion of named derivatives.
pub fn build_dispatch_url(
    service_base: &str,
    video: &VideoConfig,
    options: &TransformOptions,
    resolved_source_url: &str,
    version: u64,
) -> String {
    let mut pairs = Vec::new();

    let derivative = derivative_dimensions(video, options);
    let width = options.width.or(options.imwidth).or(derivative.and_then(|d| d.width));
    let height = options.height.or(options.imheight).or(derivative.and_then(|d| d.height));
    let quality = options.quality.clone().or_else(|| derivative.and_then(|d| d.quality.clone()));
    let compression = options.compression.clone().or_else(|| derivative.and_then(|d| d.compression.clone()));
    let format = options.format.clone().or_else(|| derivative.and_then(|d| d.format.clone()));
    let mode = options.mode.clone().or_else(|| derivative.and_then(|d| d.mode.clone()));

    if let Some(w) = width {
        pairs.push(format!("width={w}"));
    }
    if let Some(h) = height {
        pairs.push(format!("height={h}"));
    }
    if let Some(q) = quality {
        pairs.push(format!("quality={q}"));
    }
    if let Some(c) = compression {
        pairs.push(format!("compression={c}"));
    }
    if let Some(f) = format {
        pairs.push(format!("format={f}"));
    }
    if let Some(m) = mode.filter(|m| m != "video") {
        pairs.push(format!("mode={m}"));
    }

    let kv_segment = pairs.join(",");
    let base = service_base.trim_end_matches('/');
    let mut url = format!("{base}/{kv_segment}/{resolved_source_url}");
    if version > 1 {
        url.push_str(&format!("?v={version}"));
    }
    url
}
