use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use missionsync_core::Tolerance;

use crate::error::EngineError;

pub const DEFAULT_MAX_BATCH: usize = 64;
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Most requests applied before the merged view is republished.
    pub max_batch: usize,
    /// Buffered change events per subscriber before it is dropped.
    pub subscriber_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

/// Engine settings. Every field is optional in TOML:
///
/// ```toml
/// [tolerance]
/// angle_deg = 1e-7
/// depth_m = 0.001
///
/// [queue]
/// max_batch = 64
/// subscriber_capacity = 16
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerance: Tolerance,
    pub queue: QueueConfig,
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()
    }

    /// Tolerances must be finite and non-negative.
    pub fn validate(self) -> Result<Self, EngineError> {
        for (name, value) in [
            ("tolerance.angle_deg", self.tolerance.angle_deg),
            ("tolerance.depth_m", self.tolerance.depth_m),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(self)
    }

    /// Like [`EngineConfig::load`], but a missing or broken file yields defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("config load failed, using defaults: {e}");
                Self::default()
            }
        }
    }
}
