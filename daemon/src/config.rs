//! Hub configuration with TOML file support.

use anyhow::Context;
use modhub_session::SessionConfig;
use modhub_utils::LogFormat;
use modhub_wot::WotConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration of the `modhub` CLI.
///
/// Can be loaded from a TOML file via [`HubConfig::from_toml_file`]; CLI
/// flags and env vars override individual values afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding persisted settings.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Aggregation server session.
    #[serde(default)]
    pub session: SessionConfig,

    /// Trust scoring.
    #[serde(default)]
    pub wot: WotConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./modhub_data")
}

// ── Impl ───────────────────────────────────────────────────────────────

impl HubConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Path of the persisted settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            session: SessionConfig::default(),
            wot: WotConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = HubConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = HubConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = HubConfig::from_toml_str("").unwrap();
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.session.backoff_ceiling_secs, 3600);
        assert_eq!(config.wot.max_depth, 2);
    }

    #[test]
    fn nested_tables_override() {
        let toml = r#"
            log_format = "json"

            [session]
            default_server_url = "https://agg.example"
            health_timeout_secs = 3

            [wot]
            max_depth = 3
        "#;
        let config = HubConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.session.default_server_url.as_deref(),
            Some("https://agg.example")
        );
        assert_eq!(config.session.health_timeout_secs, 3);
        assert_eq!(config.session.health_min_interval_secs, 5);
        assert_eq!(config.wot.max_depth, 3);
        assert_eq!(config.wot.decay_percent, 50);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "data_dir = \"/var/lib/modhub\"").unwrap();
        let config = HubConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.settings_path(), PathBuf::from("/var/lib/modhub/settings.json"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = HubConfig::from_toml_file(Path::new("/nonexistent/modhub.toml"));
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("/nonexistent/modhub.toml"));
    }
}
