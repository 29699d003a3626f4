//! Configuration model and manager (§3 data model, §6 external interfaces,
//! component C9).
//!
//! Mirrors the teacher's `Config::from_yaml_with_env` environment
//! substitution and `validate()`-before-use pattern, but replaces the
//! SIGHUP/file-watch reload loop (`reload.rs`, dropped in the final
//! trim — this deployment model has no local file to watch) with an
//! `arc_swap::ArcSwap` snapshot that an external admin push atomically
//! swaps, matching the edge-worker deployment model of §5.

pub mod cache;
pub mod circuit_breaker;
pub mod logging;
pub mod origin;
pub mod retry;
pub mod video;

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use cache::CacheConfig;
pub use logging::LoggingConfig;
pub use origin::{AuthConfig, OriginConfig, OriginTransformOverlay, SourceConfig};
pub use video::VideoConfig;

use crate::error::ProxyError;

/// Top-level configuration record (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub version: u64,
    #[serde(default)]
    pub last_updated: Option<String>,
    pub origins: Vec<OriginConfig>,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Load and parse a configuration file from disk.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ProxyError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ProxyError::Config(format!("failed to read '{}': {e}", path.display())))?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Parse YAML, expanding `${ENV_VAR}` references against the process
    /// environment before deserializing. Fails closed: any referenced
    /// variable that isn't set aborts the load rather than substituting
    /// an empty string.
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ProxyError> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| ProxyError::Config(e.to_string()))?;

        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                ProxyError::Config(format!(
                    "environment variable '{var_name}' is referenced but not set"
                ))
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| ProxyError::Config(e.to_string()))
    }

    /// Validate cross-field invariants the type system doesn't express:
    /// unique origin names, well-formed matcher regexes, non-empty
    /// source lists.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.origins.is_empty() {
            return Err(ProxyError::Config("config has no origins".to_string()));
        }

        let mut seen_names = std::collections::HashSet::new();
        for origin in &self.origins {
            if !seen_names.insert(&origin.name) {
                return Err(ProxyError::Config(format!(
                    "duplicate origin name '{}'",
                    origin.name
                )));
            }
            origin.validate().map_err(ProxyError::Config)?;
        }

        Ok(())
    }
}

/// One entry in the configuration manager's bounded change log.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeLogEntry {
    pub from_version: u64,
    pub to_version: u64,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

const CHANGE_LOG_CAPACITY: usize = 50;

/// Holds the live configuration snapshot and accepts atomic updates.
///
/// Readers call [`ConfigManager::current`] to get a cheap `Arc` clone of
/// the active snapshot; in-flight requests keep using the snapshot they
/// started with even if an update lands mid-request, matching the
/// per-request-immutable-config requirement of the concurrency model.
pub struct ConfigManager {
    current: ArcSwap<Config>,
    change_log: Mutex<Vec<ChangeLogEntry>>,
}

impl ConfigManager {
    /// Construct a manager from an initial, already-validated config.
    pub fn new(initial: Config) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            change_log: Mutex::new(Vec::new()),
        }
    }

    /// Construct a manager with the baked-in default configuration, used
    /// until the first real load succeeds.
    pub fn with_defaults() -> Self {
        Self::new(Config {
            version: 0,
            last_updated: None,
            origins: Vec::new(),
            video: VideoConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        })
    }

    /// Load and validate a YAML document, swapping it in on success. On
    /// rejection the previous snapshot remains active and the rejection
    /// is recorded in the change log.
    pub fn apply_update(&self, yaml: &str) -> Result<Arc<Config>, ProxyError> {
        let candidate = Config::from_yaml_with_env(yaml)?;
        let previous = self.current.load_full();

        if let Err(e) = candidate.validate() {
            self.record(previous.version, candidate.version, false, Some(e.to_string()));
            return Err(e);
        }

        self.record(previous.version, candidate.version, true, None);
        self.current.store(Arc::new(candidate));
        Ok(self.current.load_full())
    }

    /// Current configuration snapshot.
    pub fn current(&self) -> Arc<Config> {
        self.current.load_full()
    }

    fn record(&self, from: u64, to: u64, accepted: bool, reason: Option<String>) {
        let mut log = self.change_log.lock();
        log.push(ChangeLogEntry {
            from_version: from,
            to_version: to,
            accepted,
            rejection_reason: reason,
        });
        let len = log.len();
        if len > CHANGE_LOG_CAPACITY {
            log.drain(0..len - CHANGE_LOG_CAPACITY);
        }
    }

    /// Snapshot of the change log, most recent last.
    pub fn change_log(&self) -> Vec<ChangeLogEntry> {
        self.change_log.lock().clone()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> String {
        r#"
version: 1
origins:
  - name: videos
    matcher: "^/v/(?P<id>[a-z0-9]+)\\.mp4$"
    captureGroupNames: ["id"]
    sources:
      - type: object_store
        bindingName: VIDEOS
        pathTemplate: "videos/${id}.mp4"
        priority: 1
"#
        .to_string()
    }

    #[test]
    fn parses_and_validates_minimal_config() {
        let cfg = Config::from_yaml_with_env(&sample_yaml()).unwrap();
        assert_eq!(cfg.version, 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_config_with_no_origins() {
        let cfg = Config {
            version: 1,
            last_updated: None,
            origins: Vec::new(),
            video: VideoConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_origin_names() {
        let mut cfg = Config::from_yaml_with_env(&sample_yaml()).unwrap();
        let dup = cfg.origins[0].clone();
        cfg.origins.push(dup);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        let yaml = format!("{}\nunknownField: true\n", sample_yaml());
        assert!(Config::from_yaml_with_env(&yaml).is_err());
    }

    #[test]
    fn env_var_substitution_fails_closed_on_missing_var() {
        let yaml = "version: 1\norigins: []\nsecret: \"${DEFINITELY_NOT_SET_XYZ}\"\n";
        let result = Config::from_yaml_with_env(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn manager_starts_with_defaults_and_accepts_valid_update() {
        let mgr = ConfigManager::with_defaults();
        assert_eq!(mgr.current().version, 0);

        mgr.apply_update(&sample_yaml()).unwrap();
        assert_eq!(mgr.current().version, 1);
        assert_eq!(mgr.change_log().len(), 1);
        assert!(mgr.change_log()[0].accepted);
    }

    #[test]
    fn manager_rejects_invalid_update_and_keeps_previous_snapshot() {
        let mgr = ConfigManager::new(Config::from_yaml_with_env(&sample_yaml()).unwrap());
        let bad_yaml = "version: 2\norigins: []\n";

        let result = mgr.apply_update(bad_yaml);
        assert!(result.is_err());
        assert_eq!(mgr.current().version, 1);
        assert!(!mgr.change_log().last().unwrap().accepted);
    }

    #[test]
    fn change_log_is_bounded() {
        let mgr = ConfigManager::new(Config::from_yaml_with_env(&sample_yaml()).unwrap());
        for _ in 0..(CHANGE_LOG_CAPACITY + 10) {
            let _ = mgr.apply_update("version: 2\norigins: []\n");
        }
        assert_eq!(mgr.change_log().len(), CHANGE_LOG_CAPACITY);
    }
}
