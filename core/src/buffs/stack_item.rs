use crate::agents::AgentId;

/// Duration contributed to a stack item by one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub src: AgentId,
    pub remaining: i64,
}

/// One live simulated instance of a buff.
///
/// Time is consumed from the base application first, then from each
/// extension in arrival order, so every consumed millisecond is attributed
/// to the source that provided it.
#[derive(Debug, Clone)]
pub struct StackItem {
    pub start: i64,
    pub src: AgentId,
    /// Source of the application this item descends from. Differs from
    /// `src` only for items reopened by a late extension.
    pub seed_src: AgentId,
    pub stack_id: u32,
    pub is_extension: bool,
    total_duration: i64,
    segments: Vec<Segment>,
}

impl StackItem {
    pub(crate) fn empty() -> Self {
        Self {
            start: 0,
            src: AgentId::UNKNOWN,
            seed_src: AgentId::UNKNOWN,
            stack_id: 0,
            is_extension: false,
            total_duration: 0,
            segments: Vec::new(),
        }
    }

    /// Reinitialize in place, keeping the segment allocation.
    pub(crate) fn reset(&mut self, seed: &StackSeed) {
        self.start = seed.start;
        self.src = seed.src;
        self.seed_src = seed.seed_src;
        self.stack_id = seed.stack_id;
        self.is_extension = seed.is_extension;
        self.total_duration = seed.duration;
        self.segments.clear();
        self.segments.push(Segment {
            src: seed.src,
            remaining: seed.duration,
        });
    }

    /// Everything ever granted to this item: base plus extensions.
    pub fn total_duration(&self) -> i64 {
        self.total_duration
    }

    pub fn remaining(&self) -> i64 {
        self.segments.iter().map(|s| s.remaining).sum()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() <= 0
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment time is currently consumed from.
    pub fn current(&self) -> Option<&Segment> {
        self.segments.iter().find(|s| s.remaining > 0)
    }

    pub fn extend(&mut self, amount: i64, src: AgentId) {
        self.total_duration += amount;
        self.segments.push(Segment { src, remaining: amount });
    }

    /// Consume up to `amount` from the current segment only.
    /// Returns the source charged and the time actually consumed.
    pub(crate) fn consume(&mut self, amount: i64) -> Option<(AgentId, i64)> {
        let segment = self.segments.iter_mut().find(|s| s.remaining > 0)?;
        let taken = amount.min(segment.remaining);
        segment.remaining -= taken;
        Some((segment.src, taken))
    }

    /// Remaining time per source, in consumption order.
    pub fn residuals(&self) -> impl Iterator<Item = Segment> + '_ {
        self.segments.iter().copied().filter(|s| s.remaining > 0)
    }
}

/// Parameters of a new stack item.
#[derive(Debug, Clone, Copy)]
pub struct StackSeed {
    pub start: i64,
    pub duration: i64,
    pub src: AgentId,
    pub seed_src: AgentId,
    pub stack_id: u32,
    pub is_extension: bool,
}

impl StackSeed {
    pub fn application(start: i64, duration: i64, src: AgentId, stack_id: u32) -> Self {
        Self {
            start,
            duration,
            src,
            seed_src: src,
            stack_id,
            is_extension: false,
        }
    }
}
