//! Buff timeline queries
//!
//! Answers arbitrary-window questions about one simulation by clipping its
//! snapshots, never by replaying. Snapshot index ranges and per-window
//! results are memoized in `TimeWindowCache`s for the lifetime of the
//! timeline.

use serde::Serialize;

use crate::agents::AgentId;
use crate::buffs::{BuffSimulation, GenerationSnapshot};
use crate::cache::TimeWindowCache;

use super::Phase;

/// Buff statistics over one phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuffPresence {
    pub phase: String,
    pub buff_id: u32,
    /// Time (ms) with at least one stack.
    pub uptime_ms: i64,
    /// `uptime_ms` over the phase duration, 0..=1.
    pub coverage: f64,
    pub average_stacks: f64,
}

pub struct BuffTimeline<'s> {
    sim: &'s BuffSimulation,
    ranges: TimeWindowCache<(usize, usize)>,
    uptimes: TimeWindowCache<i64>,
    stack_weights: TimeWindowCache<i64>,
    generation: TimeWindowCache<i64>,
    waste: TimeWindowCache<i64>,
}

impl<'s> BuffTimeline<'s> {
    pub fn new(sim: &'s BuffSimulation) -> Self {
        let (start, end) = (sim.window_start, sim.window_end);
        Self {
            sim,
            ranges: TimeWindowCache::new(start, end),
            uptimes: TimeWindowCache::new(start, end),
            stack_weights: TimeWindowCache::new(start, end),
            generation: TimeWindowCache::new(start, end),
            waste: TimeWindowCache::new(start, end),
        }
    }

    pub fn simulation(&self) -> &'s BuffSimulation {
        self.sim
    }

    /// Window clamped to the simulation and ordered.
    fn window(&self, start: i64, end: i64) -> (i64, i64) {
        self.ranges.normalize(start, end)
    }

    /// Indices of the snapshots that may overlap `[start, end)`. A cached
    /// superset range is returned as is; callers clip every snapshot.
    fn snapshot_range(&mut self, start: i64, end: i64) -> (usize, usize) {
        if let Some(&range) = self.ranges.try_get_englobing(start, end) {
            return range;
        }
        let snapshots = &self.sim.snapshots;
        let lo = snapshots.partition_point(|s| s.end <= start);
        let hi = snapshots.partition_point(|s| s.start < end);
        let range = (lo, hi.max(lo));
        self.ranges.set(start, end, range);
        range
    }

    fn snapshots(&mut self, start: i64, end: i64) -> &'s [GenerationSnapshot] {
        let (lo, hi) = self.snapshot_range(start, end);
        let sim: &'s BuffSimulation = self.sim;
        &sim.snapshots[lo..hi]
    }

    /// Time (ms) inside `[start, end)` with at least one live stack.
    pub fn uptime(&mut self, start: i64, end: i64) -> i64 {
        let (start, end) = self.window(start, end);
        if let Some(&cached) = self.uptimes.try_get(start, end) {
            return cached;
        }
        let uptime = self
            .snapshots(start, end)
            .iter()
            .filter(|s| !s.terminal && s.stack_count > 0)
            .map(|s| s.overlap(start, end))
            .sum();
        self.uptimes.set(start, end, uptime);
        uptime
    }

    /// Time-weighted stack count over `[start, end)`.
    pub fn average_stacks(&mut self, start: i64, end: i64) -> f64 {
        let (start, end) = self.window(start, end);
        if end <= start {
            return 0.0;
        }
        // Cached as stack-milliseconds
        let weighted = match self.stack_weights.try_get(start, end) {
            Some(&cached) => cached,
            None => {
                let weighted: i64 = self
                    .snapshots(start, end)
                    .iter()
                    .filter(|s| !s.terminal)
                    .map(|s| s.overlap(start, end) * s.stack_count as i64)
                    .sum();
                self.stack_weights.set(start, end, weighted);
                weighted
            }
        };
        weighted as f64 / (end - start) as f64
    }

    /// Duration of `src` consumed inside `[start, end)`.
    pub fn generated_by(&mut self, src: AgentId, start: i64, end: i64) -> i64 {
        let (start, end) = self.window(start, end);
        if let Some(&cached) = self.generation.try_get_for(start, end, Some(src)) {
            return cached;
        }
        let generated = self
            .snapshots(start, end)
            .iter()
            .flat_map(move |snap| {
                snap.slices
                    .iter()
                    .filter(move |slice| slice.consumer == src)
                    .map(move |slice| snap.clipped(slice, start, end))
            })
            .sum();
        self.generation.set_for(start, end, Some(src), generated);
        generated
    }

    /// Waste of `src` recorded inside `[start, end)`. The end of the
    /// simulation window is inclusive so end-of-log waste is not lost.
    pub fn wasted_by(&mut self, src: AgentId, start: i64, end: i64) -> i64 {
        let (start, end) = self.window(start, end);
        if let Some(&cached) = self.waste.try_get_for(start, end, Some(src)) {
            return cached;
        }
        let closes_log = end == self.sim.window_end;
        let wasted = self
            .sim
            .wastes
            .iter()
            .filter(|w| w.src == src && w.time >= start && (w.time < end || (closes_log && w.time == end)))
            .map(|w| w.amount)
            .sum();
        self.waste.set_for(start, end, Some(src), wasted);
        wasted
    }

    /// Number of live stacks at `time`.
    pub fn stacks_at(&self, time: i64) -> usize {
        let snapshots = &self.sim.snapshots;
        let index = snapshots.partition_point(|s| s.end <= time);
        snapshots
            .get(index)
            .filter(|s| !s.terminal && s.start <= time && time < s.end)
            .map_or(0, |s| s.stack_count)
    }

    /// Statistics over `phase`, clipped to the simulated window.
    pub fn presence(&mut self, phase: &Phase) -> BuffPresence {
        let (start, end) = self.window(phase.start, phase.end);
        let clipped = Phase::new(phase.name.clone(), start, end);
        let uptime_ms = self.uptime(clipped.start, clipped.end);
        let coverage = match clipped.duration() {
            0 => 0.0,
            span => uptime_ms as f64 / span as f64,
        };
        BuffPresence {
            buff_id: self.sim.buff_id,
            uptime_ms,
            coverage,
            average_stacks: self.average_stacks(clipped.start, clipped.end),
            phase: clipped.name,
        }
    }
}
