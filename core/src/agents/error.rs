//! Error types for agent identity resolution

use thiserror::Error;

use crate::combat_log::AgentHandle;

use super::{AgentId, AgentType};

/// Structural violations found while resolving agent identities.
///
/// Every variant is fatal for the log being analysed: the input broke an
/// assumption (one master per time slice, non-overlapping validity windows)
/// that downstream statistics rely on.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("{operation} requires non-player agents, got {from_type:?} {from} -> {to_type:?} {to}")]
    IncompatibleAgentTypes {
        operation: &'static str,
        from: AgentId,
        from_type: AgentType,
        to: AgentId,
        to_type: AgentType,
    },

    #[error("agent {agent} has malformed validity interval [{first_aware}, {last_aware}]")]
    MalformedInterval {
        agent: AgentId,
        first_aware: i64,
        last_aware: i64,
    },

    #[error("agents {first} and {second} have overlapping validity intervals and cannot be merged")]
    OverlappingIntervals { first: AgentId, second: AgentId },

    #[error("master {master} is not live during any part of agent {agent}'s validity interval")]
    MasterOutsideInterval { agent: AgentId, master: AgentId },

    #[error("no canonical agent for address {handle:#x} at time {time}")]
    MissingAgent { handle: AgentHandle, time: i64 },

    #[error("unknown agent id {0}")]
    UnknownAgentId(AgentId),

    #[error("{operation} requires player agents, got {agent_type:?} {agent}")]
    NotAPlayer {
        operation: &'static str,
        agent: AgentId,
        agent_type: AgentType,
    },

    #[error("regroup called with no agents")]
    EmptyRegroup,
}
