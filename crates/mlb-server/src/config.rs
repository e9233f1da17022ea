//! Server configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working setup. `MLBENCH_CONFIG` names an optional TOML file and
//! `MLBENCH_ADDR` overrides the listen address.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use mlb_solver::EmitterConfig;
use mlb_types::{ConfigurationError, MlbResult};

pub const CONFIG_ENV: &str = "MLBENCH_CONFIG";
pub const ADDR_ENV: &str = "MLBENCH_ADDR";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Idle sleep of a forwarder between two empty polls.
    pub poll_interval_ms: u64,
    pub logging: LoggingConfig,
    pub emitter: EmitterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8765".into(),
            poll_interval_ms: 100,
            logging: LoggingConfig::default(),
            emitter: EmitterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the environment: the file named by `MLBENCH_CONFIG`, then
    /// the `MLBENCH_ADDR` override.
    pub fn load() -> MlbResult<Self> {
        let path = std::env::var(CONFIG_ENV).ok();
        let addr = std::env::var(ADDR_ENV).ok();
        Self::load_from(path.as_deref().map(Path::new), addr)
    }

    pub fn load_from(path: Option<&Path>, addr_override: Option<String>) -> MlbResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        if let Some(addr) = addr_override {
            config.listen_addr = addr;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(source).map_err(|e| ConfigurationError::InvalidConfig {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigurationError::InvalidConfig {
                message: "listen_addr must not be empty".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::InvalidConfig {
                message: "poll_interval_ms must be positive".into(),
            });
        }
        self.emitter.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlb_types::MlbError;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listen_addr, "127.0.0.1:8765");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.emitter.measure_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            poll_interval_ms = 20

            [logging]
            format = "json"

            [emitter]
            log_timeout_secs = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.emitter.log_timeout_secs, 0.5);
        assert_eq!(config.emitter.viz_timeout_secs, 0.1);
    }

    #[test]
    fn validation_rejects_non_positive_values() {
        let config = ServerConfig::from_toml("poll_interval_ms = 0").unwrap();
        assert!(config.validate().is_err());
        let config = ServerConfig::from_toml("[emitter]\nmeasure_timeout_secs = -1.0").unwrap();
        assert!(config.validate().is_err());
        assert!(ServerConfig::from_toml("poll_interval_ms = \"fast\"").is_err());
    }

    #[test]
    fn address_override_and_missing_file() {
        let config = ServerConfig::load_from(None, Some("0.0.0.0:9000".into())).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");

        let missing = ServerConfig::load_from(Some(Path::new("/nonexistent/mlbench.toml")), None);
        assert!(matches!(missing, Err(MlbError::Io(_))));
    }
}
