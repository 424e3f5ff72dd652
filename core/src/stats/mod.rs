//! Statistics over simulated buff timelines, scoped by phase.

mod phase;
mod timeline;

pub use phase::Phase;
pub use timeline::{BuffPresence, BuffTimeline};
