//! Agent identity: canonical agents, their directory, and the passes that
//! reconcile raw agent records into them.

mod agent;
mod directory;
mod error;
mod resolver;

#[cfg(test)]
mod resolver_tests;

pub use agent::{AgentId, AgentItem, AgentStatus, AgentType, MergedAgent};
pub use directory::AgentDirectory;
pub use error::ResolutionError;
pub use resolver::{CombatTransition, RedirectFilter, ResolutionStats, Resolver};
