//! Configuration loading and typed config structures for the service.
//!
//! The configuration lives in `statesync-config.yaml`. Every field has a
//! default, so an empty or missing file yields a runnable service. A few
//! environment variables override the file so deployments can tweak the
//! endpoint and broadcast period without editing YAML.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::fanout::FanoutConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Network endpoint.
    #[serde(default)]
    pub server: NetworkConfig,

    /// Snapshot broadcaster settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Presence fan-out settings.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment overrides are applied after parsing:
    /// - `STATESYNC_HOST` overrides `server.host`
    /// - `STATESYNC_PORT` overrides `server.port`
    /// - `STATESYNC_BROADCAST_INTERVAL_MS` overrides `broadcast.interval_ms`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("STATESYNC_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("STATESYNC_PORT") {
            self.server.port = val
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("STATESYNC_PORT={val}: {e}")))?;
        }
        if let Ok(val) = std::env::var("STATESYNC_BROADCAST_INTERVAL_MS") {
            self.broadcast.interval_ms = val.parse().map_err(|e| {
                ConfigError::Invalid(format!("STATESYNC_BROADCAST_INTERVAL_MS={val}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Reject values that would stall or disable delivery.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("broadcast.interval_ms", self.broadcast.interval_ms == 0),
            ("broadcast.buffer_capacity", self.broadcast.buffer_capacity == 0),
            ("broadcast.max_lagged_ticks", self.broadcast.max_lagged_ticks == 0),
            ("presence.buffer_capacity", self.presence.buffer_capacity == 0),
            ("presence.max_lagged_events", self.presence.max_lagged_events == 0),
        ];
        for (name, is_zero) in checks {
            if is_zero {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }
}

/// Externally reachable endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Snapshot broadcaster configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Milliseconds between full-state resyncs.
    #[serde(default = "default_broadcast_interval_ms")]
    pub interval_ms: u64,

    /// Undrained ticks buffered per subscriber before it counts as
    /// lagging. Each tick carries the whole world.
    #[serde(default = "default_broadcast_buffer")]
    pub buffer_capacity: usize,

    /// Consecutive lagging ticks before a subscriber is dropped.
    #[serde(default = "default_max_lagged_ticks")]
    pub max_lagged_ticks: u32,
}

impl BroadcastConfig {
    /// Broadcast period as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Fan-out settings for state stream subscribers.
    pub const fn fanout(&self) -> FanoutConfig {
        FanoutConfig {
            capacity: self.buffer_capacity,
            max_consecutive_failures: self.max_lagged_ticks,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_broadcast_interval_ms(),
            buffer_capacity: default_broadcast_buffer(),
            max_lagged_ticks: default_max_lagged_ticks(),
        }
    }
}

/// Presence fan-out configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PresenceConfig {
    /// Events buffered per subscriber.
    #[serde(default = "default_presence_buffer")]
    pub buffer_capacity: usize,

    /// Consecutive undeliverable events before a subscriber is dropped.
    #[serde(default = "default_max_lagged_events")]
    pub max_lagged_events: u32,
}

impl PresenceConfig {
    /// Fan-out settings for presence subscribers.
    pub const fn fanout(&self) -> FanoutConfig {
        FanoutConfig {
            capacity: self.buffer_capacity,
            max_consecutive_failures: self.max_lagged_events,
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_presence_buffer(),
            max_lagged_events: default_max_lagged_events(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Period of the debug state dump in milliseconds (0 = disabled).
    #[serde(default)]
    pub state_dump_interval_ms: u64,
}

impl LoggingConfig {
    /// State dump period, or `None` when disabled.
    pub const fn state_dump_interval(&self) -> Option<Duration> {
        if self.state_dump_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.state_dump_interval_ms))
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            state_dump_interval_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    50051
}

const fn default_broadcast_interval_ms() -> u64 {
    50
}

const fn default_broadcast_buffer() -> usize {
    8
}

const fn default_max_lagged_ticks() -> u32 {
    20
}

const fn default_presence_buffer() -> usize {
    64
}

const fn default_max_lagged_events() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_owned()
}
