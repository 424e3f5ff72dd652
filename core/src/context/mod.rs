//! Process-level context shared by every analysis pass
//!
//! - **config**: loading `AnalysisConfig` from TOML
//! - **interner**: global string interner for agent names and accounts

mod config;
mod error;
mod interner;

pub use config::{AnalysisConfig, AnalysisConfigExt, BuffDescriptor, ResolverConfig, SimulationConfig, StackingType};
pub use error::ConfigError;
pub use interner::{IStr, empty_istr, intern, intern_account, resolve};
