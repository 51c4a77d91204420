//! Configuration module
//!
//! Application settings are read from a TOML file
//! (`~/.config/court-booking/config.toml` by default). Every section and
//! field has a default, so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::database::DatabaseConfig;
use crate::support::retry::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Root of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub logging: LoggingSection,
    pub booking: BookingSection,
    pub pricing: PricingSection,
    pub scheduler: SchedulerSection,
    pub mqtt: MqttSection,
    pub metrics: MetricsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// `sqlite://...` or `postgres://...`
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            url: defaults.url,
            max_connections: defaults.max_connections,
        }
    }
}

impl DatabaseSection {
    pub fn connection_url(&self) -> &str {
        &self.url
    }
}

impl From<&DatabaseSection> for DatabaseConfig {
    fn from(section: &DatabaseSection) -> Self {
        Self {
            url: section.url.clone(),
            max_connections: section.max_connections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// EnvFilter directive; `RUST_LOG` wins when set
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingSection {
    /// How long an unpaid pending booking holds its slots
    pub hold_minutes: i64,
    /// Venue UTC offset used to turn booking dates/times into instants
    pub utc_offset_minutes: i32,
    pub expiry_check_interval_secs: u64,
}

impl Default for BookingSection {
    fn default() -> Self {
        Self {
            hold_minutes: 15,
            utc_offset_minutes: 7 * 60,
            expiry_check_interval_secs: 60,
        }
    }
}

impl BookingSection {
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| ConfigError::Invalid {
            field: "booking.utc_offset_minutes",
            reason: format!("{} is not a valid UTC offset", self.utc_offset_minutes),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    /// Price per hour written into every slot of a new court's grid
    pub default_price_per_hour: i64,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
            default_price_per_hour: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// How often the dispatcher polls for due jobs
    pub poll_interval_ms: u64,
    /// Jobs claimed per poll
    pub batch_size: u64,
    /// A claim older than this is considered abandoned
    pub stale_after_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            batch_size: 16,
            stale_after_secs: 60,
            max_attempts: 3,
            initial_backoff_ms: 1000,
            shutdown_timeout_secs: 30,
        }
    }
}

impl SchedulerSection {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            ..RetryConfig::device_jobs()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    /// When false, light events are logged instead of published
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 1883,
            client_id: "court-booking".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            reconnect_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    /// Prometheus scrape address, e.g. `0.0.0.0:9100`. Unset disables export.
    pub listen: Option<String>,
}

impl AppConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.booking.hold_minutes <= 0 {
            return Err(ConfigError::Invalid {
                field: "booking.hold_minutes",
                reason: "must be positive".to_string(),
            });
        }
        self.booking.utc_offset()?;
        if self.pricing.default_price_per_hour < 0 {
            return Err(ConfigError::Invalid {
                field: "pricing.default_price_per_hour",
                reason: "must not be negative".to_string(),
            });
        }
        if self.scheduler.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scheduler.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(listen) = &self.metrics.listen {
            listen
                .parse::<std::net::SocketAddr>()
                .map_err(|e| ConfigError::Invalid {
                    field: "metrics.listen",
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

/// `~/.config/court-booking/config.toml`, or `./config.toml` when the
/// platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("court-booking").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.booking.hold_minutes, 15);
        assert_eq!(config.pricing.default_price_per_hour, 100_000);
        assert_eq!(config.scheduler.max_attempts, 3);
        assert_eq!(config.mqtt.reconnect_delay_ms, 2000);
        assert_eq!(
            config.booking.utc_offset().unwrap(),
            FixedOffset::east_opt(7 * 3600).unwrap()
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "postgres://court:secret@db/court"

            [mqtt]
            host = "broker.local"

            [metrics]
            listen = "127.0.0.1:9100"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.connection_url(), "postgres://court:secret@db/court");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.metrics.listen.as_deref(), Some("127.0.0.1:9100"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for raw in [
            "[booking]\nhold_minutes = 0",
            "[booking]\nutc_offset_minutes = 100000",
            "[scheduler]\nbatch_size = 0",
            "[metrics]\nlisten = \"not-an-address\"",
        ] {
            assert!(
                matches!(AppConfig::from_toml(raw), Err(ConfigError::Invalid { .. })),
                "{raw} should be rejected"
            );
        }
        assert!(matches!(
            AppConfig::from_toml("[booking\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn scheduler_retry_policy_follows_config() {
        let section = SchedulerSection {
            max_attempts: 5,
            initial_backoff_ms: 250,
            ..SchedulerSection::default()
        };
        let retry = section.retry_config();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(500));
    }
}
