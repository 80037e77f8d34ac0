//! Settings of the `revsync` binary.
//!
//! Read from `settings.toml` (optional) and overridden by `REVSYNC__*`
//! environment variables, e.g. `REVSYNC__DATABASE__URL`.
use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use engine::EngineConfig;
use serde::Deserialize;

pub const DEFAULT_SETTINGS_PATH: &str = "settings";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Database {
    pub url: String,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "sqlite:./revsync.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Gateway {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Attempts per request, first one included.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for Gateway {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/".to_string(),
            api_key: None,
            timeout_secs: 30,
            max_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub gateway: Gateway,
    pub engine: EngineConfig,
    /// Total shares per company id.
    pub shares: HashMap<String, u64>,
}

impl Settings {
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_SETTINGS_PATH)).required(false))
            .add_source(Environment::with_prefix("REVSYNC").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let settings = parse("");
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.gateway.max_attempts, 3);
        assert_eq!(settings.engine, EngineConfig::default());
        assert!(settings.shares.is_empty());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = parse(
            r#"
            [database]
            url = "sqlite::memory:"

            [engine]
            page_size = 50

            [shares]
            acme = 1000
            "#,
        );
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.engine.page_size, 50);
        assert_eq!(settings.engine.max_pages, 100);
        assert_eq!(settings.shares.get("acme"), Some(&1000));
    }
}
