//! Buff stack simulator
//!
//! Replays the buff events of one (buff, actor) pair against the buff's
//! stacking policy. State is the ordered list of live stack items plus the
//! simulation clock; events must arrive in time order.
//!
//! Time advances in steps bounded by the next segment to run out, so the
//! number of snapshots grows with the number of events and stack changes,
//! not with the length of the log.

use crate::agents::AgentId;
use crate::combat_log::BuffRemove;
use crate::context::{BuffDescriptor, SimulationConfig};

use super::SimulationError;
use super::events::{BuffEvent, BuffEventKind};
use super::pool::{StackHandle, StackItemPool};
use super::simulation::{BuffSimulation, GenerationSnapshot, StackSlice, WasteReason, WasteRecord};
use super::stack_item::{StackItem, StackSeed};
use super::stacking::{Admission, StackingLogic};

/// An item that ran out recently enough to absorb a late extension.
#[derive(Debug, Clone, Copy)]
struct RemovalCredit {
    seed_src: AgentId,
    is_extension: bool,
    expired_at: i64,
}

pub struct BuffSimulator<'a> {
    descriptor: &'a BuffDescriptor,
    config: &'a SimulationConfig,
    pool: &'a mut StackItemPool,
    stack: Vec<StackHandle>,
    clock: i64,
    credits: Vec<RemovalCredit>,
    output: BuffSimulation,
}

impl<'a> BuffSimulator<'a> {
    /// Start a simulation over `[window_start, window_end]`.
    pub fn new(
        descriptor: &'a BuffDescriptor,
        config: &'a SimulationConfig,
        pool: &'a mut StackItemPool,
        actor: AgentId,
        window_start: i64,
        window_end: i64,
    ) -> Result<Self, SimulationError> {
        if descriptor.capacity == 0 {
            return Err(SimulationError::InvalidCapacity {
                buff_id: descriptor.id,
                capacity: descriptor.capacity,
            });
        }
        let window_end = window_end.max(window_start);
        Ok(Self {
            descriptor,
            config,
            pool,
            stack: Vec::with_capacity(descriptor.capacity.min(32)),
            clock: window_start,
            credits: Vec::new(),
            output: BuffSimulation::new(descriptor.id, actor, window_start, window_end),
        })
    }

    /// Replay every event, then close the window.
    pub fn simulate(mut self, events: &[BuffEvent]) -> Result<BuffSimulation, SimulationError> {
        for event in events {
            self.process(event)?;
        }
        Ok(self.finish())
    }

    pub fn clock(&self) -> i64 {
        self.clock
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Live items in stack order.
    pub fn live_items(&self) -> impl Iterator<Item = &StackItem> + '_ {
        self.stack.iter().map(|&h| &self.pool[h])
    }

    pub fn process(&mut self, event: &BuffEvent) -> Result<(), SimulationError> {
        if event.buff_id != self.descriptor.id {
            return Err(SimulationError::WrongBuff {
                expected: self.descriptor.id,
                found: event.buff_id,
            });
        }
        if event.time > self.output.window_end {
            return Ok(());
        }
        if event.time < self.clock {
            return Err(SimulationError::NegativeTimeStep {
                buff_id: self.descriptor.id,
                actor: self.output.actor,
                time: event.time,
                clock: self.clock,
            });
        }
        self.advance(event.time);
        match event.kind {
            BuffEventKind::Apply { duration, stack_id } => {
                self.add(StackSeed::application(self.clock, duration, event.src, stack_id));
            }
            BuffEventKind::Extend { old_value, extension } => {
                self.extend(event.src, old_value, extension);
            }
            BuffEventKind::Remove {
                kind,
                removed,
                stack_id,
            } => self.remove(kind, removed, stack_id),
        }
        Ok(())
    }

    /// Advance to the end of the window and finalize what is still live.
    pub fn finish(mut self) -> BuffSimulation {
        self.advance(self.output.window_end);
        self.finalize();
        tracing::debug!(
            buff_id = self.descriptor.id,
            actor = %self.output.actor,
            snapshots = self.output.snapshots.len(),
            wastes = self.output.wastes.len(),
            "Buff simulation complete"
        );
        let placeholder = BuffSimulation::new(
            self.output.buff_id,
            self.output.actor,
            self.output.window_start,
            self.output.window_end,
        );
        std::mem::replace(&mut self.output, placeholder)
    }

    // ─── Transitions ────────────────────────────────────────────────────────

    fn add(&mut self, seed: StackSeed) {
        if seed.duration <= 0 {
            tracing::debug!(buff_id = self.descriptor.id, time = seed.start, "Ignoring empty application");
            return;
        }
        self.output.introduce(seed.src, seed.duration);
        let stacking = self.descriptor.stacking;
        let handle = self.pool.acquire(&seed);
        if !stacking.is_full(self.stack.len(), self.descriptor.capacity) {
            self.stack.push(handle);
            stacking.sort(&mut self.stack, &*self.pool);
            return;
        }

        let delay = self.config.queue_override_delay_ms;
        match stacking.find_lowest_value(&self.pool[handle], &self.stack, &*self.pool, delay) {
            Admission::Replace { index, reason } => {
                let victim = self.stack.remove(index);
                self.discard(victim, reason);
                self.stack.push(handle);
                stacking.sort(&mut self.stack, &*self.pool);
            }
            Admission::Reject => {
                self.output.wastes.push(WasteRecord {
                    src: seed.src,
                    amount: seed.duration,
                    time: self.clock,
                    reason: WasteReason::Rejected,
                });
                self.pool.release(handle);
            }
        }
    }

    /// Add `extension` to the live item whose total duration is closest to
    /// `old_value`. Ties go to the earliest item in stack order.
    fn extend(&mut self, src: AgentId, old_value: i64, extension: i64) {
        let full = self
            .descriptor
            .stacking
            .is_full(self.stack.len(), self.descriptor.capacity);
        if (!self.stack.is_empty() && old_value > 0) || full {
            let closest = self
                .stack
                .iter()
                .copied()
                .min_by_key(|&h| (self.pool[h].total_duration() - old_value).abs());
            if let Some(handle) = closest {
                self.pool[handle].extend(extension, src);
                self.output.introduce(src, extension);
                self.descriptor.stacking.sort(&mut self.stack, &*self.pool);
            }
            return;
        }

        let duration = old_value.max(0) + extension;
        if self.credits.is_empty() {
            tracing::debug!(
                buff_id = self.descriptor.id,
                time = self.clock,
                "Extension without a live stack, opening a fresh one"
            );
            self.add(StackSeed {
                start: self.clock,
                duration,
                src,
                seed_src: src,
                stack_id: 0,
                is_extension: true,
            });
        } else {
            let credit = self.credits.remove(0);
            tracing::debug!(
                buff_id = self.descriptor.id,
                time = self.clock,
                expired_at = credit.expired_at,
                "Extension raced with expiry, reopening stack"
            );
            self.add(StackSeed {
                start: self.clock,
                duration,
                src,
                seed_src: credit.seed_src,
                stack_id: 0,
                is_extension: credit.is_extension,
            });
        }
    }

    fn remove(&mut self, kind: BuffRemove, removed: i64, stack_id: u32) {
        if matches!(kind, BuffRemove::None | BuffRemove::Manual) {
            return;
        }
        if self.stack.is_empty() {
            tracing::debug!(buff_id = self.descriptor.id, time = self.clock, "Removal with no live stack");
            return;
        }
        match kind {
            BuffRemove::All => {
                for handle in std::mem::take(&mut self.stack) {
                    self.discard(handle, WasteReason::Removed);
                }
            }
            BuffRemove::Single => {
                let by_id = (stack_id != 0)
                    .then(|| self.stack.iter().position(|&h| self.pool[h].stack_id == stack_id))
                    .flatten();
                let index = by_id.or_else(|| {
                    self.stack
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, h)| (self.pool[**h].remaining() - removed).abs())
                        .map(|(i, _)| i)
                });
                if let Some(index) = index {
                    let handle = self.stack.remove(index);
                    self.discard(handle, WasteReason::Removed);
                }
            }
            BuffRemove::None | BuffRemove::Manual => {}
        }
    }

    // ─── Time ───────────────────────────────────────────────────────────────

    /// Longest step before some ticking item's current segment runs out.
    fn step_limit(&self) -> i64 {
        let ticking = if self.descriptor.stacking.ticks_all() { self.stack.len() } else { 1 };
        self.stack
            .iter()
            .take(ticking)
            .filter_map(|&h| self.pool[h].current().map(|s| s.remaining))
            .min()
            .unwrap_or(0)
    }

    fn advance(&mut self, target: i64) {
        let ticking = if self.descriptor.stacking.ticks_all() { usize::MAX } else { 1 };
        while self.clock < target && !self.stack.is_empty() {
            let step = (target - self.clock).min(self.step_limit());
            if step <= 0 {
                break;
            }

            let mut slices = Vec::with_capacity(self.stack.len());
            for (position, &handle) in self.stack.iter().enumerate() {
                let item = &mut self.pool[handle];
                let (consumer, amount) = if position < ticking {
                    item.consume(step).unwrap_or((item.src, 0))
                } else {
                    (item.current().map_or(item.src, |s| s.src), 0)
                };
                slices.push(StackSlice {
                    stack_id: item.stack_id,
                    src: item.src,
                    seed_src: item.seed_src,
                    consumer,
                    is_extension: item.is_extension,
                    total_duration: item.total_duration(),
                    amount,
                });
            }
            self.output.snapshots.push(GenerationSnapshot {
                start: self.clock,
                end: self.clock + step,
                stack_count: self.stack.len(),
                terminal: false,
                slices,
            });
            self.clock += step;

            let clock = self.clock;
            let pool = &mut *self.pool;
            let credits = &mut self.credits;
            self.stack.retain(|&handle| {
                let item = &pool[handle];
                if !item.is_expired() {
                    return true;
                }
                credits.push(RemovalCredit {
                    seed_src: item.seed_src,
                    is_extension: item.is_extension,
                    expired_at: clock,
                });
                pool.release(handle);
                false
            });
        }
        self.clock = self.clock.max(target);
        let tolerance = self.config.extension_race_tolerance_ms;
        self.credits.retain(|c| target - c.expired_at <= tolerance);
    }

    // ─── Bookkeeping ────────────────────────────────────────────────────────

    /// Record an item's remainder as waste, then release it.
    fn discard(&mut self, handle: StackHandle, reason: WasteReason) {
        if let Some(item) = self.pool.get(handle) {
            for segment in item.residuals() {
                self.output.wastes.push(WasteRecord {
                    src: segment.src,
                    amount: segment.remaining,
                    time: self.clock,
                    reason,
                });
            }
        }
        self.pool.release(handle);
    }

    /// Close the window with one zero-length snapshot of what is still live.
    fn finalize(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        let mut slices = Vec::with_capacity(self.stack.len());
        for &handle in &self.stack {
            let item = &self.pool[handle];
            for segment in item.residuals() {
                self.output.leave_residual(segment.src, segment.remaining);
            }
            slices.push(StackSlice {
                stack_id: item.stack_id,
                src: item.src,
                seed_src: item.seed_src,
                consumer: item.current().map_or(item.src, |s| s.src),
                is_extension: item.is_extension,
                total_duration: item.total_duration(),
                amount: item.remaining(),
            });
        }
        self.output.snapshots.push(GenerationSnapshot {
            start: self.clock,
            end: self.clock,
            stack_count: self.stack.len(),
            terminal: true,
            slices,
        });
        for handle in std::mem::take(&mut self.stack) {
            self.pool.release(handle);
        }
    }
}

impl Drop for BuffSimulator<'_> {
    fn drop(&mut self) {
        for handle in self.stack.drain(..) {
            self.pool.release(handle);
        }
    }
}
