pub mod agents;
pub mod analysis;
pub mod buffs;
pub mod cache;
pub mod combat_log;
pub mod context;
pub mod stats;

// Re-exports for convenience
pub use agents::{AgentDirectory, AgentId, AgentItem, AgentType, ResolutionError, ResolutionStats, Resolver};
pub use analysis::{AnalysisError, LogAnalysis};
pub use buffs::{
    BuffEvent, BuffSimulation, BuffSimulator, GenerationSnapshot, SimulationError, Simulations, StackItemPool,
    WasteReason, WasteRecord,
};
pub use cache::TimeWindowCache;
pub use combat_log::*;
pub use context::{AnalysisConfig, AnalysisConfigExt, BuffDescriptor, ConfigError, StackingType};
pub use stats::{BuffPresence, BuffTimeline, Phase};
