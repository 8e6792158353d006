use std::path::Path;

use serde::{Deserialize, Serialize};

use blockworld_space::ChunkBounds;

use crate::error::KernelError;

/// World configuration. Every field has a default, so a YAML file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Simulated milliseconds per tick.
    pub tick_millis: u64,
    /// Default delay between a creature's death and its removal, in ms.
    /// 0 removes killed creatures immediately.
    pub removal_animation_delay_ms: u64,
    /// Side length, in chunks, of the square regions ticked in parallel.
    pub region_size_chunks: i32,
    /// Lowest block y of every instance.
    pub min_y: i32,
    /// Number of block layers of every instance.
    pub height: i32,
    /// Movement-speed attribute given to new creatures, in blocks per tick.
    pub default_movement_speed: f64,
    /// Ticks without progress before a direct path gives up.
    pub max_stalled_steps: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_millis: 50,
            removal_animation_delay_ms: 1000,
            region_size_chunks: 4,
            min_y: -64,
            height: 384,
            default_movement_speed: 0.1,
            max_stalled_steps: 20,
        }
    }
}

impl WorldConfig {
    /// Parse and validate a YAML config.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, KernelError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KernelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Reject values the world cannot run with.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.tick_millis == 0 {
            return Err(KernelError::InvalidConfig("tick_millis must be positive".into()));
        }
        if self.region_size_chunks <= 0 {
            return Err(KernelError::InvalidConfig(
                "region_size_chunks must be positive".into(),
            ));
        }
        if self.height <= 0 {
            return Err(KernelError::InvalidConfig("height must be positive".into()));
        }
        if !(self.default_movement_speed.is_finite() && self.default_movement_speed >= 0.0) {
            return Err(KernelError::InvalidConfig(
                "default_movement_speed must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    /// Vertical bounds for new instances.
    pub fn chunk_bounds(&self) -> ChunkBounds {
        ChunkBounds {
            min_y: self.min_y,
            height: self.height,
        }
    }
}
