//! Simulation output: generation snapshots and waste records for one
//! (buff, actor) pair, plus the per-source ledger used to check them.

use hashbrown::HashMap;

use crate::agents::AgentId;

/// Why part of an application had no lasting effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasteReason {
    /// Replaced by a newer application on a single-slot buff.
    Overridden,
    /// Pushed out of a full stack by a stronger application.
    Evicted,
    /// Turned away by a full stack.
    Rejected,
    /// Stripped by a removal event before running out.
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WasteRecord {
    pub src: AgentId,
    pub amount: i64,
    pub time: i64,
    pub reason: WasteReason,
}

/// One stack item's share of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSlice {
    pub stack_id: u32,
    pub src: AgentId,
    pub seed_src: AgentId,
    /// Source whose duration this slice consumed.
    pub consumer: AgentId,
    pub is_extension: bool,
    pub total_duration: i64,
    /// Time consumed during the snapshot. Waiting queue items consume 0.
    /// For the terminal snapshot: the item's unconsumed remainder.
    pub amount: i64,
}

/// Stack composition over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSnapshot {
    pub start: i64,
    pub end: i64,
    pub stack_count: usize,
    /// Zero-length record of what was still live when the window closed.
    pub terminal: bool,
    pub slices: Vec<StackSlice>,
}

impl GenerationSnapshot {
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Sum of the total durations of the items live in this snapshot.
    pub fn total_duration(&self) -> i64 {
        self.slices.iter().map(|s| s.total_duration).sum()
    }

    /// Length of `[start, end)` covered by this snapshot.
    pub fn overlap(&self, start: i64, end: i64) -> i64 {
        (self.end.min(end) - self.start.max(start)).max(0)
    }

    /// Time a slice consumed inside `[start, end)`. Consumption runs from
    /// the snapshot start, so a slice covers `[self.start, self.start + amount)`.
    pub fn clipped(&self, slice: &StackSlice, start: i64, end: i64) -> i64 {
        if self.terminal {
            return 0;
        }
        let slice_end = self.start + slice.amount;
        (slice_end.min(end) - self.start.max(start)).max(0)
    }
}

/// Full replay result for one buff on one actor.
#[derive(Debug, Clone)]
pub struct BuffSimulation {
    pub buff_id: u32,
    pub actor: AgentId,
    pub window_start: i64,
    pub window_end: i64,
    pub snapshots: Vec<GenerationSnapshot>,
    pub wastes: Vec<WasteRecord>,
    introduced: HashMap<AgentId, i64>,
    /// Per-source duration still live when the window closed.
    residual: HashMap<AgentId, i64>,
}

impl BuffSimulation {
    pub(crate) fn new(buff_id: u32, actor: AgentId, window_start: i64, window_end: i64) -> Self {
        Self {
            buff_id,
            actor,
            window_start,
            window_end,
            snapshots: Vec::new(),
            wastes: Vec::new(),
            introduced: HashMap::new(),
            residual: HashMap::new(),
        }
    }

    pub(crate) fn introduce(&mut self, src: AgentId, amount: i64) {
        *self.introduced.entry(src).or_default() += amount;
    }

    pub(crate) fn leave_residual(&mut self, src: AgentId, amount: i64) {
        *self.residual.entry(src).or_default() += amount;
    }

    /// Every source that applied or extended this buff.
    pub fn sources(&self) -> Vec<AgentId> {
        let mut sources: Vec<AgentId> = self.introduced.keys().copied().collect();
        sources.sort_unstable();
        sources
    }

    /// Duration applied or extended by `src`.
    pub fn introduced_by(&self, src: AgentId) -> i64 {
        self.introduced.get(&src).copied().unwrap_or(0)
    }

    /// Duration of `src` consumed over the whole window, including what was
    /// still live when the window closed.
    pub fn generated_by(&self, src: AgentId) -> i64 {
        let consumed: i64 = self
            .snapshots
            .iter()
            .filter(|s| !s.terminal)
            .flat_map(|s| s.slices.iter())
            .filter(|s| s.consumer == src)
            .map(|s| s.amount)
            .sum();
        consumed + self.residual.get(&src).copied().unwrap_or(0)
    }

    pub fn wasted_by(&self, src: AgentId) -> i64 {
        self.wastes.iter().filter(|w| w.src == src).map(|w| w.amount).sum()
    }

    /// Generation + waste accounts for every introduced millisecond.
    pub fn is_conserved(&self) -> bool {
        self.introduced
            .iter()
            .all(|(&src, &amount)| self.generated_by(src) + self.wasted_by(src) == amount)
    }

    pub fn terminal(&self) -> Option<&GenerationSnapshot> {
        self.snapshots.last().filter(|s| s.terminal)
    }
}
