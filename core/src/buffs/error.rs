use thiserror::Error;

use crate::agents::AgentId;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("buff {buff_id} on {actor}: event at {time} precedes simulation clock {clock}")]
    NegativeTimeStep {
        buff_id: u32,
        actor: AgentId,
        time: i64,
        clock: i64,
    },

    #[error("simulation of buff {expected} received an event for buff {found}")]
    WrongBuff { expected: u32, found: u32 },

    #[error("buff {buff_id} has invalid stack capacity {capacity}")]
    InvalidCapacity { buff_id: u32, capacity: usize },
}
