//! Profiler configuration
//!
//! Everything the enablement gate reads lives here. The config is
//! deserializable from TOML so host applications can ship it alongside
//! their other monitoring settings, but a hand-built `ProfilerConfig`
//! works just as well.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default maximum lifetime of a recording session in milliseconds.
pub const DEFAULT_MAX_SESSION_MILLIS: u64 = 30_000;

/// Default sampling frequency in Hz.
pub const DEFAULT_TRACES_HZ: u32 = 101;

/// Errors raised while loading configuration from disk.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration consumed by the enablement gate and the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Fraction of traced workloads eligible for profiling. A rate of
    /// exactly 0.0 disables profiling entirely.
    pub sample_rate: f64,

    /// Sampling frequency in Hz. 0 disables profiling.
    pub traces_hz: u32,

    /// Deprecated interval knob. Still accepted from configuration so
    /// existing config files keep parsing, but it has no effect.
    #[deprecated(note = "superseded by traces_hz; read but never acted upon")]
    pub traces_interval_hz: u32,

    /// Directory where the sampler writes raw trace output. Absent
    /// disables profiling.
    pub traces_dir: Option<PathBuf>,

    /// Upper bound on a single recording session's lifetime.
    pub max_session_millis: u64,

    /// Environment name stamped on artifacts when the capture does not
    /// report one.
    pub environment: String,
}

impl Default for ProfilerConfig {
    #[allow(deprecated)]
    fn default() -> Self {
        ProfilerConfig {
            sample_rate: 1.0,
            traces_hz: DEFAULT_TRACES_HZ,
            traces_interval_hz: 0,
            traces_dir: None,
            max_session_millis: DEFAULT_MAX_SESSION_MILLIS,
            environment: "production".to_string(),
        }
    }
}

impl ProfilerConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Maximum session lifetime as a `Duration`.
    pub fn max_session_duration(&self) -> Duration {
        Duration::from_millis(self.max_session_millis)
    }

    /// Whether a traces directory is configured with a non-empty path.
    pub fn has_traces_dir(&self) -> bool {
        self.traces_dir
            .as_deref()
            .is_some_and(|p| !p.as_os_str().is_empty())
    }
}
