//! Analysis configuration
//!
//! This module re-exports the shared configuration types from evtc-types and
//! adds TOML loading and validation for `AnalysisConfig`.

use std::fs;
use std::path::Path;

pub use evtc_types::{
    AnalysisConfig, BuffDescriptor, ResolverConfig, SimulationConfig, StackingType,
};

use super::ConfigError;

/// Extension trait for AnalysisConfig loading
pub trait AnalysisConfigExt: Sized {
    fn from_toml_str(content: &str) -> Result<Self, toml::de::Error>;
    fn load(path: &Path) -> Result<Self, ConfigError>;
    fn validate(&self) -> Result<(), ConfigError>;
}

impl AnalysisConfigExt for AnalysisConfig {
    fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load and validate a configuration file. Missing sections fall back to defaults.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            buffs = config.buffs.len(),
            "Loaded analysis configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for buff in &self.buffs {
            if buff.capacity == 0 {
                return Err(ConfigError::InvalidDescriptor {
                    buff_id: buff.id,
                    reason: "capacity must be at least 1".to_string(),
                });
            }
            if buff.stacking == StackingType::ForceOverride && buff.capacity != 1 {
                return Err(ConfigError::InvalidDescriptor {
                    buff_id: buff.id,
                    reason: "force override buffs hold a single stack".to_string(),
                });
            }
        }
        if self.simulation.extension_race_tolerance_ms < 0 {
            return Err(ConfigError::InvalidDescriptor {
                buff_id: 0,
                reason: "extension race tolerance cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}
