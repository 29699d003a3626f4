//! Cache key grammar and versioning (§4 cache key grammar, component C7).
//!
//! Grounded on the teacher's `CacheKey`/`url_encode_cache_key` pattern in
//! `entry.rs`: a `Display`/`FromStr` pair over a deterministic, colon
//! delimited string, with percent-encoding for path segments and a fixed
//! field order so two requests that resolve to the same derivative always
//! produce the same key regardless of query-parameter order.

use std::fmt;

use crate::constants::DIMENSION_BUCKET;

/// Resolved transform options that participate in the cache key, after
/// origin defaults and derivative lookup have been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub derivative: Option<String>,
    pub imwidth: Option<u32>,
    pub imheight: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<String>,
    pub compression: Option<String>,
    pub format: Option<String>,
    pub mode: Option<String>,
}

impl TransformOptions {
    /// Round width/height-like dimensions to the nearest bucket so
    /// near-identical responsive requests share a cache entry.
    fn bucketed(dim: u32) -> u32 {
        let bucket = DIMENSION_BUCKET.max(1);
        ((dim + bucket / 2) / bucket) * bucket
    }
}

/// A fully qualified video cache key: `video:<source_path>` plus the
/// resolved derivative/dimension/quality/compression/format/mode
/// components that affect the bytes stored at this key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCacheKey {
    pub source_path: String,
    pub options: TransformOptions,
    /// Version counter from the version-counter namespace for this
    /// source path; bumped on a cache miss that successfully repopulates.
    pub version: u64,
}

impl VideoCacheKey {
    /// Everything the `Display` grammar writes except the trailing
    /// `:v<n>` version component, shared with [`VideoCacheKey::version_namespace`]
    /// so the namespace a version counter lives under is always exactly
    /// "this key, minus its version".
    fn write_base<W: fmt::Write>(&self, f: &mut W) -> fmt::Result {
        write!(f, "video:{}", encode_segment(&self.source_path))?;
        if let Some(d) = &self.options.derivative {
            write!(f, ":derivative={}", encode_segment(d))?;
        }
        if let Some(w) = self.options.imwidth {
            write!(f, ":imwidth={}", TransformOptions::bucketed(w))?;
        }
        if let Some(h) = self.options.imheight {
            write!(f, ":imheight={}", TransformOptions::bucketed(h))?;
        }
        if let Some(w) = self.options.width {
            write!(f, ":w={}", TransformOptions::bucketed(w))?;
        }
        if let Some(h) = self.options.height {
            write!(f, ":h={}", TransformOptions::bucketed(h))?;
        }
        if let Some(q) = &self.options.quality {
            write!(f, ":q={}", encode_segment(q))?;
        }
        if let Some(c) = &self.options.compression {
            write!(f, ":c={}", encode_segment(c))?;
        }
        if let Some(fmt_) = &self.options.format {
            write!(f, ":f={}", encode_segment(fmt_))?;
        }
        if let Some(m) = self.options.mode.as_deref().filter(|m| *m != "video") {
            write!(f, ":mode={}", encode_segment(m))?;
        }
        Ok(())
    }

    /// Stable identifier for this key's source path and transform options,
    /// independent of the version counter (component C6's VersionCounter
    /// namespace). Two keys that differ only in `version` share one
    /// namespace, so bumping the counter for one is visible to the other.
    pub fn version_namespace(&self) -> String {
        let mut s = String::new();
        self.write_base(&mut s).expect("String fmt::Write is infallible");
        s
    }
}

impl fmt::Display for VideoCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_base(f)?;
        write!(f, ":v{}", self.version)
    }
}

/// Distinct cache-key namespace for fallback artifacts (§3 "fallback
/// artifacts use a distinct key suffix"): keyed on the raw source path
/// only, independent of transform options or version, so every request
/// that fails to transform the same source shares one cached original
/// instead of each derivative re-fetching it.
pub fn fallback_key_for(source_path: &str) -> String {
    format!("fallback:{}", encode_segment(source_path))
}

fn encode_segment(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' => "/".to_string(),
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            _ => format!("%{:02X}", c as u32),
        })
        .collect()
}
