//! Buff replay: per-(buff, actor) stack simulation over resolved events.
//!
//! - **events**: buff events bound to canonical agents
//! - **stacking**: admission and ordering rules per stacking archetype
//! - **pool**: reusable stack items behind generation-checked handles
//! - **simulator**: the state machine replaying one event stream
//! - **simulations**: every (buff, actor) pair of a log, optionally in parallel

mod error;
mod events;
mod pool;
mod simulation;
mod simulations;
mod simulator;
mod stack_item;
mod stacking;


pub use error::SimulationError;
pub use events::{BuffEvent, BuffEventKind, group_buff_events};
pub use pool::{StackHandle, StackItemPool};
pub use simulation::{BuffSimulation, GenerationSnapshot, StackSlice, WasteReason, WasteRecord};
pub use simulations::Simulations;
pub use simulator::BuffSimulator;
pub use stack_item::{Segment, StackItem, StackSeed};
pub use stacking::{Admission, StackingLogic};
