//! Configuration loading for roomlink.
//!
//! Configuration is loaded from a TOML file; every field has a default.

use room_core::{ClockState, DEFAULT_ROOM};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Application name sent with the room join (default: "default").
    #[serde(default = "default_app")]
    pub app: String,
    /// Room to join (default: "default").
    #[serde(default = "default_room")]
    pub room: String,
    /// Transport endpoint (default: ws://localhost:8080).
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Clock synchronization settings.
    #[serde(default)]
    pub clock: ClockConfig,
}

/// Clock synchronization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Time authority URL probed with GET (default: http://localhost:8080/).
    #[serde(default = "default_clock_endpoint")]
    pub endpoint: String,
    /// Resolution of the remote timestamp in ms (default: 1000).
    #[serde(default = "default_precision_ms")]
    pub precision_ms: u64,
    /// Offset samples kept for averaging (default: 10).
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Back-to-back probes before the steady cadence (default: 10).
    #[serde(default = "default_converge_probes")]
    pub converge_probes: u64,
    /// Seconds between steady-state probes (default: 300 = 5 minutes).
    #[serde(default = "default_steady_interval_secs")]
    pub steady_interval_secs: u64,
    /// Seconds before a probe request is abandoned (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_app() -> String {
    "default".to_string()
}

fn default_room() -> String {
    DEFAULT_ROOM.to_string()
}

fn default_server_url() -> String {
    "ws://localhost:8080".to_string()
}

fn default_clock_endpoint() -> String {
    "http://localhost:8080/".to_string()
}

fn default_precision_ms() -> u64 {
    room_core::DEFAULT_PRECISION_MS
}

fn default_max_samples() -> usize {
    room_core::DEFAULT_MAX_SAMPLES
}

fn default_converge_probes() -> u64 {
    room_core::DEFAULT_CONVERGE_PROBES
}

fn default_steady_interval_secs() -> u64 {
    room_core::DEFAULT_STEADY_INTERVAL.as_secs()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            app: default_app(),
            room: default_room(),
            server_url: default_server_url(),
            clock: ClockConfig::default(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            endpoint: default_clock_endpoint(),
            precision_ms: default_precision_ms(),
            max_samples: default_max_samples(),
            converge_probes: default_converge_probes(),
            steady_interval_secs: default_steady_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClockConfig {
    /// Steady-state probe interval.
    pub fn steady_interval(&self) -> Duration {
        Duration::from_secs(self.steady_interval_secs)
    }

    /// Per-probe request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// A fresh estimator using this policy.
    pub fn clock_state(&self) -> ClockState {
        ClockState::with_policy(
            self.max_samples,
            self.converge_probes,
            self.steady_interval(),
            self.precision_ms,
        )
    }
}

impl AdapterConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the clock estimator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.max_samples == 0 {
            return Err(ConfigError::Invalid(
                "clock.max_samples must be at least 1".into(),
            ));
        }
        if self.clock.steady_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "clock.steady_interval_secs must be at least 1".into(),
            ));
        }
        if self.clock.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "clock.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to render configuration.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] toml::ser::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
