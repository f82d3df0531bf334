//! Encoder configuration
//!
//! Everything tunable about an encode lives here: the nesting bound and the
//! buffer growth policy. Configurations deserialize from JSON with every field
//! optional, and must pass [`EncoderConfig::validate`] before use.

use crate::buffer::BufferPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default nesting bound for encode and decode
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Smallest growth factor that keeps appends amortized O(1)
pub const MIN_GROWTH_FACTOR: f64 = 1.5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("growth factor must be a finite number >= 1.5, got {0}")]
    GrowthFactorTooSmall(f64),

    #[error("max capacity {limit} is below the initial capacity {initial}")]
    CapacityLimitBelowInitial { initial: usize, limit: usize },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Deepest node level the encoder will visit (root is level 0)
    pub max_depth: usize,
    pub buffer: BufferPolicy,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            buffer: BufferPolicy::default(),
        }
    }
}

impl EncoderConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    ///
    /// ```
    /// use treepack::EncoderConfig;
    ///
    /// let config = EncoderConfig::from_json(r#"{"max_depth": 32}"#).unwrap();
    /// assert_eq!(config.max_depth, 32);
    /// assert_eq!(config.buffer.growth_factor, 2.0);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EncoderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_buffer(mut self, policy: BufferPolicy) -> Self {
        self.buffer = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let factor = self.buffer.growth_factor;
        if !factor.is_finite() || factor < MIN_GROWTH_FACTOR {
            return Err(ConfigError::GrowthFactorTooSmall(factor));
        }
        if let Some(limit) = self.buffer.max_capacity {
            if limit < self.buffer.initial_capacity {
                return Err(ConfigError::CapacityLimitBelowInitial {
                    initial: self.buffer.initial_capacity,
                    limit,
                });
            }
        }
        Ok(())
    }
}
