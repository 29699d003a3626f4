//! Logging/observability configuration (§3 ambient layer A2).

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_BREADCRUMBS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub enabled_components: Vec<String>,
    #[serde(default)]
    pub disabled_components: Vec<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default)]
    pub breadcrumbs: BreadcrumbsConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            enabled_components: Vec::new(),
            disabled_components: Vec::new(),
            sample_rate: default_sample_rate(),
            breadcrumbs: BreadcrumbsConfig::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_sample_rate() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreadcrumbsConfig {
    #[serde(default = "default_breadcrumbs_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for BreadcrumbsConfig {
    fn default() -> Self {
        Self {
            enabled: default_breadcrumbs_enabled(),
            max_items: default_max_items(),
        }
    }
}

fn default_breadcrumbs_enabled() -> bool {
    true
}

fn default_max_items() -> usize {
    DEFAULT_MAX_BREADCRUMBS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = LoggingConfig::default();
        assert_eq!(c.level, "info");
        assert!(c.breadcrumbs.enabled);
        assert_eq!(c.breadcrumbs.max_items, DEFAULT_MAX_BREADCRUMBS);
    }

    #[test]
    fn deserializes_camel_case_fields() {
        let yaml = "level: debug\nenabledComponents: [\"resolver\"]\nsampleRate: 0.5\n";
        let c: LoggingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.level, "debug");
        assert_eq!(c.enabled_components, vec!["resolver".to_string()]);
        assert_eq!(c.sample_rate, 0.5);
    }
}
