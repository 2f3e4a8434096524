use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine settings. Every field has a default so an empty JSON object is a
/// valid config.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Ordered candidate agencies for bare id resolution. Empty means every
    /// agency in the graph.
    pub agency_ids: Vec<String>,
    pub vehicle_history_capacity: usize,
    pub schedule_patch_interval_secs: u64,
    pub vehicle_feed_interval_secs: u64,
    /// Warn when auto-discovered agencies exceed this many.
    pub warn_agency_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agency_ids: Vec::new(),
            vehicle_history_capacity: 20,
            schedule_patch_interval_secs: 60,
            vehicle_feed_interval_secs: 15,
            warn_agency_threshold: 3,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn schedule_patch_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_patch_interval_secs)
    }

    pub fn vehicle_feed_interval(&self) -> Duration {
        Duration::from_secs(self.vehicle_feed_interval_secs)
    }
}
