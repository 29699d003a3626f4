//! Origin, Source, and Auth configuration types (§3 data model).
//!
//! Mirrors the teacher's `config/bucket.rs` pattern: plain serde structs
//! with `#[serde(default)]` on optional nested fields, validated by a
//! separate `validate()` pass rather than encoded in the type system
//! (regex compilation, capture-name alignment, and priority ordering all
//! need runtime data the type alone can't express).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::circuit_breaker::CircuitBreakerConfigYaml;
use super::retry::RetryConfigYaml;
use crate::cache::ttl::TtlByStatus;

/// A named, regex-matched configuration unit: an ordered list of sources
/// plus origin-level policy overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginConfig {
    pub name: String,
    /// Regex pattern matched against the request path.
    pub matcher: String,
    /// Capture group names aligned positionally with the regex's groups.
    #[serde(default)]
    pub capture_group_names: Vec<String>,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub ttl_by_status: Option<TtlByStatus>,
    #[serde(default)]
    pub transform_options: Option<OriginTransformOverlay>,
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryConfigYaml>,
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfigYaml>,
}

/// Origin-level transform option overlay: defaults applied before the
/// request's own query-derived options, and before cache-key computation
/// so writes and reads never disagree on the key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OriginTransformOverlay {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

/// A concrete retrieval target within an origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    ObjectStore {
        #[serde(rename = "bindingName")]
        binding_name: String,
        #[serde(rename = "pathTemplate")]
        path_template: String,
        #[serde(default)]
        priority: u32,
    },
    Remote {
        #[serde(rename = "baseUrl")]
        base_url: String,
        #[serde(rename = "pathTemplate")]
        path_template: String,
        #[serde(default)]
        auth: Option<AuthConfig>,
        #[serde(default)]
        priority: u32,
    },
    Fallback {
        #[serde(rename = "baseUrl")]
        base_url: String,
        #[serde(rename = "pathTemplate")]
        path_template: String,
        #[serde(default)]
        auth: Option<AuthConfig>,
        #[serde(default)]
        priority: u32,
    },
}

impl SourceConfig {
    pub fn priority(&self) -> u32 {
        match self {
            SourceConfig::ObjectStore { priority, .. } => *priority,
            SourceConfig::Remote { priority, .. } => *priority,
            SourceConfig::Fallback { priority, .. } => *priority,
        }
    }

    pub fn path_template(&self) -> &str {
        match self {
            SourceConfig::ObjectStore { path_template, .. } => path_template,
            SourceConfig::Remote { path_template, .. } => path_template,
            SourceConfig::Fallback { path_template, .. } => path_template,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SourceConfig::Fallback { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::ObjectStore { .. } => "object_store",
            SourceConfig::Remote { .. } => "remote",
            SourceConfig::Fallback { .. } => "fallback",
        }
    }
}

/// Authentication for a `Remote` or `Fallback` source. All fields are
/// resolved from the configuration's environment map; templates expand
/// `${ENV_VAR}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    AwsSig {
        access_key_var: String,
        secret_key_var: String,
        region: String,
        service: String,
    },
    Bearer {
        token_var: String,
    },
    Header {
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    Query {
        #[serde(default)]
        params: HashMap<String, String>,
    },
    Basic {
        user_var: String,
        pass_var: String,
    },
}

impl OriginConfig {
    /// Validate structural invariants that the type system can't express:
    /// non-empty sources, a resolvable regex, and capture-group-name
    /// alignment.
    pub fn validate(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err(format!("origin '{}' has no sources", self.name));
        }
        let compiled = regex::Regex::new(&self.matcher)
            .map_err(|e| format!("origin '{}' has invalid matcher regex: {e}", self.name))?;
        let group_count = compiled.captures_len().saturating_sub(1);
        if self.capture_group_names.len() > group_count {
            return Err(format!(
                "origin '{}' declares {} capture group names but the regex has only {} groups",
                self.name,
                self.capture_group_names.len(),
                group_count
            ));
        }
        Ok(())
    }
}
