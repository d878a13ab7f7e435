//! Tuner configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to format config: {0}")]
    Format(#[from] toml::ser::Error),
}

/// Configuration for a tuner session.
///
/// Timing fields default to the values the polling loops were written
/// against; tests tighten them through the same struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Frontend device node.
    pub frontend_path: PathBuf,
    /// Demux device node (one open per pid filter).
    pub demux_path: PathBuf,
    /// Dvr device node for bulk transport-stream reads.
    pub dvr_path: PathBuf,
    /// Interval between lock polls, and the sub-timeout of each legacy
    /// event poll.
    pub lock_poll_interval_ms: u64,
    /// Consecutive positive lock readings required before declaring a
    /// stable lock.
    pub lock_debounce_count: u32,
    /// Settle delay after a full teardown in `stop_tune`.
    pub tune_stop_delay_ms: u64,
    /// Backoff applied before erroring out of a stream read.
    pub read_backoff_ms: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            frontend_path: PathBuf::from("/dev/dvb/adapter0/frontend0"),
            demux_path: PathBuf::from("/dev/dvb/adapter0/demux0"),
            dvr_path: PathBuf::from("/dev/dvb/adapter0/dvr0"),
            lock_poll_interval_ms: 100,
            lock_debounce_count: 3,
            tune_stop_delay_ms: 100,
            read_backoff_ms: 100,
        }
    }
}

impl TunerConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
