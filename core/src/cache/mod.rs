//! Interval-keyed memoization for statistics over one log.

mod window_cache;

pub use window_cache::{TimeWindowCache, WindowKey};
