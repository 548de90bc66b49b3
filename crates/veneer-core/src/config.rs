// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Translator configuration, loadable from RON.

use crate::fence::WaitPolicy;
use crate::state::CONSTANT_BUFFER_SLOTS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest number of texture units the translator tracks.
pub const MAX_TEXTURE_UNITS: usize = 16;

/// An error loading or validating a [`TranslatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The RON text is malformed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    /// The configuration could not be written as RON.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables of a [`Translator`](crate::Translator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Size of the frame fence ring.
    pub frames_in_flight: usize,
    /// Number of texture units exposed to callers.
    pub texture_units: usize,
    /// Initial size in bytes of each per-stage constant buffer.
    pub constant_buffer_size: u64,
    /// Multiplier applied when a buffer grows.
    pub growth_factor: u32,
    /// Non-blocking fence polls before `begin_frame` falls back to the wait policy.
    pub fence_poll_spins: u32,
    /// What `begin_frame` does when the ring is full.
    pub wait_policy: WaitPolicy,
    /// Log skipped draws at `debug` level.
    pub log_skipped_draws: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            texture_units: 8,
            constant_buffer_size: 256,
            growth_factor: 2,
            fence_poll_spins: 64,
            wait_policy: WaitPolicy::Block,
            log_skipped_draws: true,
        }
    }
}

impl TranslatorConfig {
    /// Parses a configuration from RON text. Missing fields take their defaults.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            ron::de::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a RON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: Self =
            ron::de::from_bytes(&bytes).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        log::info!("Loaded translator configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Writes the configuration as pretty-printed RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Checks that every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "frames_in_flight must be at least 1".into(),
            ));
        }
        if self.texture_units == 0 || self.texture_units > MAX_TEXTURE_UNITS {
            return Err(ConfigError::Invalid(format!(
                "texture_units must be between 1 and {MAX_TEXTURE_UNITS}, got {}",
                self.texture_units
            )));
        }
        if self.constant_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "constant_buffer_size must be non-zero".into(),
            ));
        }
        if self.growth_factor == 0 {
            return Err(ConfigError::Invalid("growth_factor must be at least 1".into()));
        }
        Ok(())
    }

    /// Constant buffer slots per stage. Fixed by the native binding model.
    pub const fn constant_buffer_slots(&self) -> usize {
        CONSTANT_BUFFER_SLOTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = TranslatorConfig::from_ron_str("(frames_in_flight: 3, wait_policy: Poll)").unwrap();
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.wait_policy, WaitPolicy::Poll);
        assert_eq!(config.texture_units, 8);
        assert_eq!(config.growth_factor, 2);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            TranslatorConfig::from_ron_str("(frames_in_flight: 0)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TranslatorConfig::from_ron_str("(texture_units: 17)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TranslatorConfig::from_ron_str("(growth_factor: 0)"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_malformed_ron() {
        assert!(matches!(
            TranslatorConfig::from_ron_str("(frames_in_flight: "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_pretty_output_parses_back() {
        let config = TranslatorConfig {
            texture_units: 4,
            log_skipped_draws: false,
            ..Default::default()
        };
        let text = config.to_ron_string().unwrap();
        assert!(text.contains("texture_units: 4"));
        assert_eq!(TranslatorConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let result = TranslatorConfig::load("/nonexistent/veneer.ron");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
