use thiserror::Error;

use crate::agents::ResolutionError;
use crate::buffs::SimulationError;
use crate::context::ConfigError;

/// Failure of one log's analysis. Every variant aborts that log.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid analysis configuration")]
    Config(#[from] ConfigError),

    #[error("agent resolution failed")]
    Resolution(#[from] ResolutionError),

    #[error("buff simulation failed")]
    Simulation(#[from] SimulationError),
}
