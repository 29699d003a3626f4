//! Cache policy configuration (§3, §6).

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_TTL_CLIENT_ERROR_SECS, DEFAULT_TTL_OK_SECS, DEFAULT_TTL_REDIRECT_SECS,
    DEFAULT_TTL_SERVER_ERROR_SECS,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_max_age")]
    pub default_max_age: u64,
    #[serde(default)]
    pub enable_cache_tags: bool,
    #[serde(default)]
    pub ttl: TtlConfig,
    #[serde(default = "default_bypass_params")]
    pub bypass_query_parameters: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_max_age: default_max_age(),
            enable_cache_tags: false,
            ttl: TtlConfig::default(),
            bypass_query_parameters: default_bypass_params(),
        }
    }
}

fn default_max_age() -> u64 {
    DEFAULT_TTL_OK_SECS
}

fn default_bypass_params() -> Vec<String> {
    crate::constants::DEFAULT_BYPASS_QUERY_PARAMS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// TTL-by-status-class policy, overridable per origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtlConfig {
    #[serde(default = "default_ok")]
    pub ok: u64,
    #[serde(default = "default_redirects")]
    pub redirects: u64,
    #[serde(default = "default_client_error")]
    pub client_error: u64,
    #[serde(default = "default_server_error")]
    pub server_error: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            ok: default_ok(),
            redirects: default_redirects(),
            client_error: default_client_error(),
            server_error: default_server_error(),
        }
    }
}

fn default_ok() -> u64 {
    DEFAULT_TTL_OK_SECS
}
fn default_redirects() -> u64 {
    DEFAULT_TTL_REDIRECT_SECS
}
fn default_client_error() -> u64 {
    DEFAULT_TTL_CLIENT_ERROR_SECS
}
fn default_server_error() -> u64 {
    DEFAULT_TTL_SERVER_ERROR_SECS
}
