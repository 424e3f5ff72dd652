//! Stack item pool
//!
//! Arena of reusable `StackItem`s addressed by generation-checked handles.
//! Releasing an item bumps its slot generation, so a stale handle can never
//! read the slot's next occupant.

use std::ops::{Index, IndexMut};

use super::stack_item::{StackItem, StackSeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    live: bool,
    item: StackItem,
}

#[derive(Debug, Default)]
pub struct StackItemPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl StackItemPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a slot for a new item, reusing a released one when available.
    pub fn acquire(&mut self, seed: &StackSeed) -> StackHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    live: false,
                    item: StackItem::empty(),
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.live = true;
        slot.item.reset(seed);
        StackHandle {
            index,
            generation: slot.generation,
        }
    }

    /// Return an item to the pool. Returns `false` for a stale handle.
    pub fn release(&mut self, handle: StackHandle) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        true
    }

    pub fn get(&self, handle: StackHandle) -> Option<&StackItem> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.live && s.generation == handle.generation)
            .map(|s| &s.item)
    }

    pub fn get_mut(&mut self, handle: StackHandle) -> Option<&mut StackItem> {
        self.slot_mut(handle).map(|s| &mut s.item)
    }

    fn slot_mut(&mut self, handle: StackHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.live && s.generation == handle.generation)
    }

    /// Items currently handed out.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Slots allocated so far, live or free.
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }
}

impl Index<StackHandle> for StackItemPool {
    type Output = StackItem;

    /// Panics on a released handle.
    fn index(&self, handle: StackHandle) -> &StackItem {
        match self.get(handle) {
            Some(item) => item,
            None => panic!("stack handle {handle:?} read after release"),
        }
    }
}

impl IndexMut<StackHandle> for StackItemPool {
    fn index_mut(&mut self, handle: StackHandle) -> &mut StackItem {
        match self.get_mut(handle) {
            Some(item) => item,
            None => panic!("stack handle {handle:?} read after release"),
        }
    }
}
