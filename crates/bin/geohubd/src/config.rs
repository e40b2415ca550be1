//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `geohub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use geohub_adapter_mqtt::MqttConfig;
use geohub_app::action_dispatcher::DispatcherConfig;
use geohub_app::housekeeping::HousekeepingConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection and topic prefix.
    pub mqtt: MqttConfig,
    /// Where areas and rules are persisted.
    pub storage: StorageConfig,
    /// Evaluation and dispatch settings.
    pub engine: EngineConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// JSON file storage configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the configuration document.
    pub path: String,
}

/// Engine configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Channel receiving device-control commands.
    pub device_control_topic: String,
    /// Gateway MAC stamped on control commands.
    pub gateway_mac: String,
    /// Location history entries kept per entity.
    pub history_capacity: usize,
    pub housekeeping_interval_secs: u64,
    pub history_retention_secs: u64,
    /// Abort pending delayed actions when the same rule fires again for the same entity.
    pub cancel_stale_delayed_actions: bool,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `geohub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("geohub.toml")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("GEOHUB_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("GEOHUB_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("GEOHUB_CONFIG_PATH") {
            self.storage.path = val;
        }
        if let Some(val) = var("GEOHUB_DEVICE_TOPIC") {
            self.engine.device_control_topic = val;
        }
        if let Some(val) = var("GEOHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation("mqtt.broker_port must be non-zero".to_string()));
        }
        if self.engine.history_capacity == 0 {
            return Err(ConfigError::Validation(
                "engine.history_capacity must be non-zero".to_string(),
            ));
        }
        if self.engine.housekeeping_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "engine.housekeeping_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.engine.device_control_topic.trim().is_empty() {
            return Err(ConfigError::Validation(
                "engine.device_control_topic must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Dispatcher settings derived from the engine section.
    #[must_use]
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            device_control_topic: self.engine.device_control_topic.clone(),
            gateway_mac: self.engine.gateway_mac.clone(),
            cancel_stale_delayed_actions: self.engine.cancel_stale_delayed_actions,
        }
    }

    /// Housekeeping settings derived from the engine section.
    #[must_use]
    pub fn housekeeping(&self) -> HousekeepingConfig {
        HousekeepingConfig {
            interval: Duration::from_secs(self.engine.housekeeping_interval_secs),
            history_retention: Duration::from_secs(self.engine.history_retention_secs),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: geohub_adapter_storage_json::json_store::DEFAULT_PATH.to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_control_topic: "modular".to_string(),
            gateway_mac: String::new(),
            history_capacity: geohub_app::location_tracker::DEFAULT_HISTORY_CAPACITY,
            housekeeping_interval_secs: 30,
            history_retention_secs: 24 * 60 * 60,
            cancel_stale_delayed_actions: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "geohubd=info,geohub=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.broker_host, "localhost");
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.storage.path, "geofence_config.json");
        assert_eq!(config.engine.device_control_topic, "modular");
        assert_eq!(config.engine.history_capacity, 100);
        assert_eq!(config.engine.housekeeping_interval_secs, 30);
        assert!(!config.engine.cancel_stale_delayed_actions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [mqtt]
            broker_host = 'broker.lan'
            broker_port = 1884
            client_id = 'geohub-test'
            topic_prefix = 'home'

            [storage]
            path = '/var/lib/geohub/geofences.json'

            [engine]
            device_control_topic = 'relay'
            gateway_mac = 'AA:BB:CC:DD:EE:FF'
            history_capacity = 10
            housekeeping_interval_secs = 5
            history_retention_secs = 60
            cancel_stale_delayed_actions = true

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mqtt.broker_host, "broker.lan");
        assert_eq!(config.mqtt.topic_prefix, "home");
        assert_eq!(config.storage.path, "/var/lib/geohub/geofences.json");
        assert_eq!(config.engine.history_capacity, 10);
        assert_eq!(config.logging.filter, "debug");

        let dispatcher = config.dispatcher();
        assert_eq!(dispatcher.device_control_topic, "relay");
        assert_eq!(dispatcher.gateway_mac, "AA:BB:CC:DD:EE:FF");
        assert!(dispatcher.cancel_stale_delayed_actions);

        let housekeeping = config.housekeeping();
        assert_eq!(housekeeping.interval, Duration::from_secs(5));
        assert_eq!(housekeeping.history_retention, Duration::from_secs(60));
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("GEOHUB_MQTT_HOST", "10.0.0.2"),
            ("GEOHUB_MQTT_PORT", "8883"),
            ("GEOHUB_CONFIG_PATH", "/tmp/geo.json"),
            ("GEOHUB_DEVICE_TOPIC", "relay"),
            ("GEOHUB_LOG", "trace"),
        ]));
        assert_eq!(config.mqtt.broker_host, "10.0.0.2");
        assert_eq!(config.mqtt.broker_port, 8883);
        assert_eq!(config.storage.path, "/tmp/geo.json");
        assert_eq!(config.engine.device_control_topic, "relay");
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_prefer_rust_log_and_ignore_bad_port() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("GEOHUB_MQTT_PORT", "not-a-port"),
            ("GEOHUB_LOG", "trace"),
            ("RUST_LOG", "warn"),
        ]));
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.mqtt.broker_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_history_capacity() {
        let mut config = Config::default();
        config.engine.history_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_housekeeping_interval() {
        let mut config = Config::default();
        config.engine.housekeeping_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_empty_device_topic() {
        let mut config = Config::default();
        config.engine.device_control_topic = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
