//! TTL-by-status-class policy (§4, §6 C7).

use serde::{Deserialize, Serialize};

use crate::config::cache::TtlConfig;

/// TTL overrides for a single origin, falling back to the global
/// `TtlConfig` defaults field-by-field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtlByStatus {
    #[serde(default)]
    pub ok: Option<u64>,
    #[serde(default)]
    pub redirects: Option<u64>,
    #[serde(default)]
    pub client_error: Option<u64>,
    #[serde(default)]
    pub server_error: Option<u64>,
}

impl TtlByStatus {
    /// Resolve a TTL for an HTTP status code, applying this origin's
    /// overrides over the global defaults.
    pub fn resolve(&self, status: u16, defaults: &TtlConfig) -> u64 {
        match status {
            200..=299 => self.ok.unwrap_or(defaults.ok),
            300..=399 => self.redirects.unwrap_or(defaults.redirects),
            400..=499 => self.client_error.unwrap_or(defaults.client_error),
            500..=599 => self.server_error.unwrap_or(defaults.server_error),
            _ => defaults.ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults_when_unset() {
        let t = TtlByStatus::default();
        let d = TtlConfig::default();
        assert_eq!(t.resolve(200, &d), d.ok);
        assert_eq!(t.resolve(404, &d), d.client_error);
        assert_eq!(t.resolve(503, &d), d.server_error);
        assert_eq!(t.resolve(301, &d), d.redirects);
    }

    #[test]
    fn origin_override_wins() {
        let t = TtlByStatus {
            ok: Some(10),
            ..Default::default()
        };
        let d = TtlConfig::default();
        assert_eq!(t.resolve(200, &d), 10);
        assert_eq!(t.resolve(404, &d), d.client_error);
    }
}
