//! Stacking policies
//!
//! Admission, eviction and ordering rules per buff archetype. The set of
//! archetypes is closed (`StackingType`); each rule is one `match`.

use crate::context::StackingType;

use super::pool::{StackHandle, StackItemPool};
use super::simulation::WasteReason;
use super::stack_item::StackItem;

/// Outcome of an application on a full stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Drop the item at `index` (wasting its remainder) and admit the new one.
    Replace { index: usize, reason: WasteReason },
    /// Discard the incoming item.
    Reject,
}

/// Rules a stacking archetype applies to the live stack.
pub trait StackingLogic {
    /// Whether every live item ticks, or only the head of the queue.
    fn ticks_all(&self) -> bool;

    fn is_full(&self, len: usize, capacity: usize) -> bool;

    /// Restore the policy's ordering after an insertion.
    fn sort(&self, stack: &mut [StackHandle], pool: &StackItemPool);

    /// Decide what happens to `incoming` when the stack is full.
    fn find_lowest_value(
        &self,
        incoming: &StackItem,
        stack: &[StackHandle],
        pool: &StackItemPool,
        override_delay: i64,
    ) -> Admission;
}

impl StackingLogic for StackingType {
    fn ticks_all(&self) -> bool {
        self.ticks_all_stacks()
    }

    fn is_full(&self, len: usize, capacity: usize) -> bool {
        match self {
            StackingType::CappedDuration => false,
            StackingType::ForceOverride => len >= 1,
            _ => len >= capacity,
        }
    }

    fn sort(&self, stack: &mut [StackHandle], pool: &StackItemPool) {
        if *self == StackingType::Duration && stack.len() > 2 {
            // Head keeps ticking; the waiting line is longest first
            stack[1..].sort_by_key(|&h| std::cmp::Reverse(pool[h].remaining()));
        }
    }

    fn find_lowest_value(
        &self,
        incoming: &StackItem,
        stack: &[StackHandle],
        pool: &StackItemPool,
        override_delay: i64,
    ) -> Admission {
        match self {
            StackingType::CappedDuration | StackingType::ConditionalLoss => Admission::Reject,
            StackingType::ForceOverride => {
                if stack.is_empty() {
                    Admission::Reject
                } else {
                    Admission::Replace {
                        index: 0,
                        reason: WasteReason::Overridden,
                    }
                }
            }
            StackingType::Intensity => {
                let weakest = stack
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, h)| pool[**h].remaining());
                match weakest {
                    Some((index, &h)) if incoming.total_duration() >= pool[h].remaining() => {
                        Admission::Replace {
                            index,
                            reason: WasteReason::Evicted,
                        }
                    }
                    _ => Admission::Reject,
                }
            }
            StackingType::Queue | StackingType::Duration => {
                // The active head is never evicted unless it is alone
                let waiting = if stack.len() > 1 { 1 } else { 0 };
                let delay = if *self == StackingType::Queue { override_delay } else { 0 };
                let shortest = stack
                    .iter()
                    .enumerate()
                    .skip(waiting)
                    .min_by_key(|(_, h)| pool[**h].total_duration());
                match shortest {
                    Some((index, &h)) if incoming.total_duration() > pool[h].total_duration() + delay => {
                        Admission::Replace {
                            index,
                            reason: WasteReason::Evicted,
                        }
                    }
                    _ => Admission::Reject,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentId;
    use crate::buffs::stack_item::StackSeed;

    fn fill(pool: &mut StackItemPool, durations: &[i64]) -> Vec<StackHandle> {
        durations
            .iter()
            .map(|&d| pool.acquire(&StackSeed::application(0, d, AgentId::UNKNOWN, 0)))
            .collect()
    }

    fn incoming(duration: i64) -> StackItem {
        let mut item = StackItem::empty();
        item.reset(&StackSeed::application(0, duration, AgentId::UNKNOWN, 0));
        item
    }

    #[test]
    fn test_capped_duration_is_never_full() {
        assert!(!StackingType::CappedDuration.is_full(1000, 1));
        let mut pool = StackItemPool::new();
        let stack = fill(&mut pool, &[100]);
        assert_eq!(
            StackingType::CappedDuration.find_lowest_value(&incoming(5000), &stack, &pool, 0),
            Admission::Reject
        );
    }

    #[test]
    fn test_force_override_holds_one_item() {
        assert!(!StackingType::ForceOverride.is_full(0, 5));
        assert!(StackingType::ForceOverride.is_full(1, 5));
        let mut pool = StackItemPool::new();
        let stack = fill(&mut pool, &[5000]);
        assert_eq!(
            StackingType::ForceOverride.find_lowest_value(&incoming(10), &stack, &pool, 0),
            Admission::Replace {
                index: 0,
                reason: WasteReason::Overridden
            }
        );
    }

    #[test]
    fn test_intensity_evicts_weakest_when_incoming_is_longer() {
        let mut pool = StackItemPool::new();
        let stack = fill(&mut pool, &[3000, 1000, 2000]);
        assert_eq!(
            StackingType::Intensity.find_lowest_value(&incoming(1500), &stack, &pool, 0),
            Admission::Replace {
                index: 1,
                reason: WasteReason::Evicted
            }
        );
        assert_eq!(
            StackingType::Intensity.find_lowest_value(&incoming(500), &stack, &pool, 0),
            Admission::Reject
        );
        assert_eq!(
            StackingType::ConditionalLoss.find_lowest_value(&incoming(5000), &stack, &pool, 0),
            Admission::Reject
        );
    }

    #[test]
    fn test_queue_spares_active_head_and_respects_delay() {
        let mut pool = StackItemPool::new();
        let stack = fill(&mut pool, &[100, 2000, 1000]);
        assert_eq!(
            StackingType::Queue.find_lowest_value(&incoming(1010), &stack, &pool, 15),
            Admission::Reject
        );
        assert_eq!(
            StackingType::Queue.find_lowest_value(&incoming(1020), &stack, &pool, 15),
            Admission::Replace {
                index: 2,
                reason: WasteReason::Evicted
            }
        );
    }

    #[test]
    fn test_duration_sorts_waiting_line_longest_first() {
        let mut pool = StackItemPool::new();
        let mut stack = fill(&mut pool, &[100, 1000, 3000, 2000]);
        let head = stack[0];
        StackingType::Duration.sort(&mut stack, &pool);
        assert_eq!(stack[0], head);
        let waiting: Vec<i64> = stack[1..].iter().map(|&h| pool[h].remaining()).collect();
        assert_eq!(waiting, vec![3000, 2000, 1000]);
    }
}
