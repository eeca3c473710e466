//! Configuration structures for the hubclock daemon and synchronizer.
//!
//! Supports TOML deserialization with defaults matching the recalibration
//! schedule the synchronizer was tuned for.

use crate::error::{HubError, HubResult};
use crate::time::{duration_to_ns_i64, duration_to_ns_u64};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Timestamp synchronizer tuning.
    pub sync: SyncConfig,

    /// Logging configuration.
    pub logging: LogConfig,

    /// Wake lock configuration.
    pub wakelock: WakelockConfig,

    /// Background sampling worker configuration.
    pub worker: WorkerConfig,
}

/// Recalibration schedule of the timestamp synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Offset is recomputed once this much wall-clock time has passed.
    #[serde(with = "humantime_serde")]
    pub recalibration_interval: Duration,

    /// Maximum tick-domain time between the two counter reads that bracket
    /// a wall-clock sample for the sample to be accepted.
    #[serde(with = "humantime_serde")]
    pub gap_threshold: Duration,

    /// Sampling attempts per calibration pass.
    pub max_iterations: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            recalibration_interval: Duration::from_secs(60),
            gap_threshold: Duration::from_micros(10),
            max_iterations: 20,
        }
    }
}

impl SyncConfig {
    /// Recalibration interval in nanoseconds.
    #[must_use]
    pub fn interval_ns(&self) -> i64 {
        duration_to_ns_i64(self.recalibration_interval)
    }

    /// Gap threshold in nanoseconds.
    #[must_use]
    pub fn gap_threshold_ns(&self) -> u64 {
        duration_to_ns_u64(self.gap_threshold)
    }

    /// Check the schedule for values the estimator cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Config`] for a zero interval or iteration budget.
    pub fn validate(&self) -> HubResult<()> {
        if self.recalibration_interval.is_zero() {
            return Err(HubError::Config(
                "sync.recalibration_interval must be non-zero".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(HubError::Config(
                "sync.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Log verbosity, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No output.
    Silent,
    /// Errors only.
    Error,
    /// Informational messages.
    #[default]
    Info,
    /// Debug messages.
    Debug,
    /// Everything, including per-sample traces.
    Verbose,
}

impl LogLevel {
    /// Equivalent `tracing` filter directive.
    #[must_use]
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Silent => "off",
            Self::Error => "error",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Verbose => "trace",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Process-wide verbosity.
    pub level: LogLevel,
    /// Tag attached to every record emitted by the daemon.
    pub tag: String,
    /// Write to stderr instead of stdout. On by default so stdout carries
    /// only the daemon's JSON reports.
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            tag: String::from("sensors"),
            stderr: true,
        }
    }
}

/// Kernel wake lock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakelockConfig {
    /// Hold a wake lock while sampling.
    pub enabled: bool,
    /// Name written to the lock and unlock nodes.
    pub name: String,
    /// Node that takes the lock.
    pub lock_path: PathBuf,
    /// Node that drops the lock.
    pub unlock_path: PathBuf,
}

impl Default for WakelockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: String::from("hubclock"),
            lock_path: PathBuf::from("/sys/power/wake_lock"),
            unlock_path: PathBuf::from("/sys/power/wake_unlock"),
        }
    }
}

/// Background sampling worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Name of the worker thread.
    pub thread_name: String,
    /// Time between diagnostic samples.
    #[serde(with = "humantime_serde")]
    pub sample_period: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: String::from("hubclock-worker"),
            sample_period: Duration::from_secs(1),
        }
    }
}

impl HubConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, bytes = content.len(), "Read config file");
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all sections.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> HubResult<()> {
        self.sync.validate()?;
        if self.wakelock.enabled && self.wakelock.name.is_empty() {
            return Err(HubError::Config(
                "wakelock.name must not be empty when wakelock is enabled".into(),
            ));
        }
        if self.worker.sample_period.is_zero() {
            return Err(HubError::Config(
                "worker.sample_period must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
