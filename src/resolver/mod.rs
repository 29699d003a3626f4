//! Origin resolution (§3, §4, component C3).
//!
//! Matches a request path against configured origins in declaration
//! order (first match wins), extracts named capture groups, and expands
//! each candidate source's path template against them. Grounded on the
//! teacher's regex-driven `RequestLogger::glob_to_regex` include/exclude
//! matching in `observability/request_logging.rs`, generalized from a
//! boolean include/exclude test into capture extraction.

use std::collections::HashMap;

use regex::Regex;

use crate::config::origin::OriginConfig;
use crate::error::ProxyError;

/// A compiled origin: the configured regex plus its capture group names,
/// rebuilt whenever the configuration snapshot changes.
struct CompiledOrigin {
    config: OriginConfig,
    regex: Regex,
}

/// Immutable, regex-compiled view over a configuration snapshot's
/// origins. Constructed once per config load; never mutated, so it's
/// safely shared across concurrent requests without locking.
pub struct Resolver {
    origins: Vec<CompiledOrigin>,
}

/// Outcome of matching a request path against the origin table.
pub struct ResolvedOrigin<'a> {
    pub origin: &'a OriginConfig,
    pub captures: HashMap<String, String>,
}

impl Resolver {
    pub fn build(origins: &[OriginConfig]) -> Result<Self, ProxyError> {
        let compiled = origins
            .iter()
            .map(|o| {
                Regex::new(&o.matcher)
                    .map(|regex| CompiledOrigin {
                        config: o.clone(),
                        regex,
                    })
                    .map_err(|e| ProxyError::Config(format!("origin '{}': {e}", o.name)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { origins: compiled })
    }

    /// Find the first origin (in declaration order) whose matcher matches
    /// `path`, and extract its named captures.
    pub fn resolve(&self, path: &str) -> Result<ResolvedOrigin<'_>, ProxyError> {
        for compiled in &self.origins {
            if let Some(caps) = compiled.regex.captures(path) {
                let mut captures = HashMap::new();
                for (i, name) in compiled.config.capture_group_names.iter().enumerate() {
                    if let Some(m) = caps.get(i + 1) {
                        captures.insert(name.clone(), m.as_str().to_string());
                    }
                }
                // Also expose numbered captures for templates that
                // reference `${1}` directly instead of a named group.
                for i in 1..caps.len() {
                    if let Some(m) = caps.get(i) {
                        captures.insert(i.to_string(), m.as_str().to_string());
                    }
                }
                return Ok(ResolvedOrigin {
                    origin: &compiled.config,
                    captures,
                });
            }
        }
        Err(ProxyError::Resolution(format!("no origin matched path '{path}'")))
    }

    /// All origins (in declaration order) whose matcher matches `path`,
    /// used by the dispatcher's failover loop (§4.5 step 4).
    pub fn resolve_all(&self, path: &str) -> Result<Vec<ResolvedOrigin<'_>>, ProxyError> {
        let mut matches = Vec::new();
        for compiled in &self.origins {
            if let Some(caps) = compiled.regex.captures(path) {
                let mut captures = HashMap::new();
                for (i, name) in compiled.config.capture_group_names.iter().enumerate() {
                    if let Some(m) = caps.get(i + 1) {
                        captures.insert(name.clone(), m.as_str().to_string());
                    }
                }
                for i in 1..caps.len() {
                    if let Some(m) = caps.get(i) {
                        captures.insert(i.to_string(), m.as_str().to_string());
                    }
                }
                matches.push(ResolvedOrigin {
                    origin: &compiled.config,
                    captures,
                });
            }
        }
        if matches.is_empty() {
            return Err(ProxyError::Resolution(format!("no origin matched path '{path}'")));
        }
        Ok(matches)
    }
}

/// Expand a path template's `${name}` placeholders against resolved
/// captures, plus the special `${request_path}` binding for the full
/// original path.
pub fn expand_template(template: &str, captures: &HashMap<String, String>, request_path: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = template[i + 2..].find('}') {
                let name = &template[i + 2..i + 2 + end];
                let value = if name == "request_path" {
                    request_path.to_string()
                } else {
                    captures.get(name).cloned().unwrap_or_default()
                };
                out.push_str(&value);
                i += 2 + end + 1;
                continue;
            }
        }
        let c = template[i..].chars().next().unwrap();
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// Sort sources by ascending priority (lower number tried first),
/// stable on ties so configuration order is the tiebreaker.
pub fn ordered_sources(origin: &OriginConfig) -> Vec<&crate::config::origin::SourceConfig> {
    let mut sources: Vec<_> = origin.sources.iter().collect();
    sources.sort_by_key(|s| s.priority());
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(name: &str, matcher: &str, capture_names: &[&str]) -> OriginConfig {
        OriginConfig {
            name: name.to_string(),
            matcher: matcher.to_string(),
            capture_group_names: capture_names.iter().map(|s| s.to_string()).collect(),
            sources: vec![],
            ttl_by_status: None,
            transform_options: None,
            quality: None,
            compression: None,
            retry: None,
            circuit_breaker: None,
        }
    }

    #[test]
    fn resolves_first_matching_origin_in_order() {
        let origins = vec![
            origin("a", r"^/a/(?P<id>\w+)$", &["id"]),
            origin("b", r"^/(?P<any>.+)$", &["any"]),
        ];
        let resolver = Resolver::build(&origins).unwrap();
        let resolved = resolver.resolve("/a/123").unwrap();
        assert_eq!(resolved.origin.name, "a");
        assert_eq!(resolved.captures["id"], "123");
    }

    #[test]
    fn falls_through_to_later_origin_on_no_match() {
        let origins = vec![
            origin("a", r"^/a/(?P<id>\w+)$", &["id"]),
            origin("catchall", r"^/(?P<any>.+)$", &["any"]),
        ];
        let resolver = Resolver::build(&origins).unwrap();
        let resolved = resolver.resolve("/videos/x.mp4").unwrap();
        assert_eq!(resolved.origin.name, "catchall");
    }

    #[test]
    fn no_match_is_a_resolution_error() {
        let origins = vec![origin("a", r"^/a/(?P<id>\w+)$", &["id"])];
        let resolver = Resolver::build(&origins).unwrap();
        assert!(resolver.resolve("/nope").is_err());
    }

    #[test]
    fn expand_template_substitutes_named_and_numbered_and_request_path() {
        let mut caps = HashMap::new();
        caps.insert("id".to_string(), "alpha".to_string());
        caps.insert("1".to_string(), "alpha".to_string());
        let expanded = expand_template("videos/${id}.mp4?orig=${request_path}", &caps, "/v/alpha.mp4");
        assert_eq!(expanded, "videos/alpha.mp4?orig=/v/alpha.mp4");
    }

    #[test]
    fn resolve_all_returns_every_matching_origin_in_order() {
        let origins = vec![
            origin("a", r"^/v/(?P<id>\w+)$", &["id"]),
            origin("catchall", r"^/(?P<any>.+)$", &["any"]),
        ];
        let resolver = Resolver::build(&origins).unwrap();
        let matches = resolver.resolve_all("/v/alpha").unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].origin.name, "a");
        assert_eq!(matches[1].origin.name, "catchall");
    }

    #[test]
    fn sources_are_ordered_by_ascending_priority() {
        use crate::config::origin::SourceConfig;
        let mut o = origin("a", "^/a$", &[]);
        o.sources = vec![
            SourceConfig::Fallback {
                base_url: "https://fb".to_string(),
                path_template: "/x".to_string(),
                auth: None,
                priority: 9,
            },
            SourceConfig::ObjectStore {
                binding_name: "B".to_string(),
                path_template: "/y".to_string(),
                priority: 1,
            },
        ];
        let ordered = ordered_sources(&o);
        assert_eq!(ordered[0].priority(), 1);
        assert_eq!(ordered[1].priority(), 9);
    }
}
