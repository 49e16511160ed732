//! Application configuration.
//!
//! Loaded from a TOML file and overridden by `TICKAVG__SECTION__KEY`
//! environment variables, e.g. `TICKAVG__API__PORT=9090` or
//! `TICKAVG__COLLECT__SYMBOLS=BTCUSDT,ETHUSDT`.

use crate::error::{AppError, AppResult};
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tickavg_api::ApiConfig;
use tickavg_feed::DEFAULT_BATCH_SIZE;
use tickavg_ws::SourceConfig;
use tracing::warn;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Where trade records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process only, lost on exit.
    Memory,
    /// Daily JSON Lines files under `data_dir`.
    #[default]
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/trades")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// Symbols collected by `tickavg collect` and, with `auto_start`, by `serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Start collecting `symbols` when the HTTP server starts.
    #[serde(default)]
    pub auto_start: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            batch_size: default_batch_size(),
            auto_start: false,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub collect: CollectConfig,
}

impl AppConfig {
    /// Load `path` (if present) plus process environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        Self::load_with_env(path, env_overrides())
    }

    /// Load `path` (if present) plus the given environment source.
    pub fn load_with_env(path: &str, env: Environment) -> AppResult<Self> {
        let mut builder = Config::builder();
        if Path::new(path).exists() {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            warn!(path, "Config file not found, using defaults");
        }

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without environment overrides.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> AppResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> AppResult<()> {
        let source = &self.source;
        if !(source.url.starts_with("ws://") || source.url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "source.url must be a ws:// or wss:// URL, got {}",
                source.url
            )));
        }
        if source.subscribe_timeout_ms == 0 {
            return Err(AppError::Config(
                "source.subscribe_timeout_ms must be positive".to_string(),
            ));
        }
        if source.heartbeat_interval_ms == 0 || source.heartbeat_timeout_ms == 0 {
            return Err(AppError::Config(
                "source heartbeat interval and timeout must be positive".to_string(),
            ));
        }
        if source.reconnect_base_delay_ms > source.reconnect_max_delay_ms {
            return Err(AppError::Config(format!(
                "source.reconnect_base_delay_ms ({}) exceeds reconnect_max_delay_ms ({})",
                source.reconnect_base_delay_ms, source.reconnect_max_delay_ms
            )));
        }

        if self.storage.backend == StorageBackend::Jsonl
            && self.storage.data_dir.as_os_str().is_empty()
        {
            return Err(AppError::Config(
                "storage.data_dir is required for the jsonl backend".to_string(),
            ));
        }

        if self.collect.batch_size == 0 || self.api.default_batch_size == 0 {
            return Err(AppError::Config("batch sizes must be positive".to_string()));
        }
        if let Some(bad) = self
            .collect
            .symbols
            .iter()
            .find(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(AppError::Config(format!(
                "collect.symbols contains an invalid symbol: {bad:?}"
            )));
        }
        if self.collect.auto_start && self.collect.symbols.is_empty() {
            return Err(AppError::Config(
                "collect.auto_start requires at least one symbol".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix("TICKAVG")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("collect.symbols")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: ::config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_overrides().source(Some(map))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.backend, StorageBackend::Jsonl);
        assert_eq!(config.collect.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [storage]
            backend = "memory"

            [collect]
            symbols = ["BTCUSDT", "ETHUSDT"]
            batch_size = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.collect.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.collect.batch_size, 25);
        assert_eq!(config.source.subscribe_timeout_ms, 10_000);
    }

    #[test]
    fn test_shipped_default_config_parses() {
        let config = AppConfig::from_toml(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.collect.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert!(!config.collect.auto_start);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_with_env("/nonexistent/tickavg.toml", env(&[])).unwrap();
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[api]\nport = 9000\n\n[collect]\nsymbols = [\"BTCUSDT\"]").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = AppConfig::load_with_env(
            &path,
            env(&[
                ("TICKAVG__API__PORT", "9090"),
                ("TICKAVG__COLLECT__SYMBOLS", "ETHUSDT,BNBUSDT"),
            ]),
        )
        .unwrap();
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.collect.symbols, vec!["ETHUSDT", "BNBUSDT"]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.source.url = "https://example.com".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.collect.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.collect.symbols = vec!["BTC/USDT".to_string()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.collect.auto_start = true;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.source.reconnect_base_delay_ms = 120_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rendered_config_round_trips() {
        let mut config = AppConfig::default();
        config.collect.symbols = vec!["BTCUSDT".to_string()];
        let text = config.to_toml().unwrap();
        assert!(text.contains("[collect]"));
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.collect.symbols, config.collect.symbols);
        assert_eq!(parsed.storage.data_dir, config.storage.data_dir);
    }
}
