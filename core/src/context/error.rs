//! Error types for context operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration TOML in {path}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid buff descriptor {buff_id}: {reason}")]
    InvalidDescriptor { buff_id: u32, reason: String },
}
