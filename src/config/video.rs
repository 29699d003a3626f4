//! Video/transformation configuration (§3, §6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Named derivative presets plus request-time defaults and passthrough
/// policy for already-compliant formats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default)]
    pub derivatives: HashMap<String, DerivativeConfig>,
    #[serde(default)]
    pub defaults: DerivativeConfig,
    #[serde(default)]
    pub passthrough: PassthroughConfig,
    /// When both `derivative` and responsive (`imwidth`/`w`/`h`) parameters
    /// are present, prefer the named derivative's settings. Defaults to
    /// false: responsive parameters win, matching a mobile-first client
    /// mix where explicit dimensions are the common case.
    #[serde(default)]
    pub prefer_derivative_over_responsive: bool,
    /// Base URL of the transformation service the dispatcher composes
    /// `<service_base>/<opts>/<source_url>` calls against. Not named in
    /// the source configuration record's top-level schema; kept here as
    /// the one nested field a dispatcher plainly cannot function without.
    #[serde(default)]
    pub service_base: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivativeConfig {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassthroughConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub whitelisted_formats: Vec<String>,
}

impl PassthroughConfig {
    pub fn allows(&self, format: &str) -> bool {
        self.enabled && self.whitelisted_formats.iter().any(|f| f.eq_ignore_ascii_case(format))
    }
}
