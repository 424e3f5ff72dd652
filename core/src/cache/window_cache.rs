//! Time-window cache
//!
//! Memoizes results computed over `[start, end]` windows of one log, with an
//! optional target agent. Keys are clamped to the log bounds and ordered
//! before every insert or lookup, so `(end, start)` and `(start, end)` hit
//! the same entry. Entries are never evicted; the cache is dropped with the
//! analysis that owns it.

use hashbrown::HashMap;

use crate::agents::AgentId;

/// Normalized cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub start: i64,
    pub end: i64,
    pub target: Option<AgentId>,
}

#[derive(Debug, Clone)]
pub struct TimeWindowCache<T> {
    log_start: i64,
    log_end: i64,
    entries: HashMap<WindowKey, T>,
}

impl<T> TimeWindowCache<T> {
    pub fn new(log_start: i64, log_end: i64) -> Self {
        Self {
            log_start: log_start.min(log_end),
            log_end: log_start.max(log_end),
            entries: HashMap::new(),
        }
    }

    /// Clamp both ends to the log, then order them.
    pub fn normalize(&self, start: i64, end: i64) -> (i64, i64) {
        let start = start.clamp(self.log_start, self.log_end);
        let end = end.clamp(self.log_start, self.log_end);
        if start > end { (end, start) } else { (start, end) }
    }

    fn key(&self, start: i64, end: i64, target: Option<AgentId>) -> WindowKey {
        let (start, end) = self.normalize(start, end);
        WindowKey { start, end, target }
    }

    pub fn set(&mut self, start: i64, end: i64, value: T) {
        self.set_for(start, end, None, value);
    }

    pub fn set_for(&mut self, start: i64, end: i64, target: Option<AgentId>, value: T) {
        let key = self.key(start, end, target);
        self.entries.insert(key, value);
    }

    pub fn try_get(&self, start: i64, end: i64) -> Option<&T> {
        self.try_get_for(start, end, None)
    }

    pub fn try_get_for(&self, start: i64, end: i64, target: Option<AgentId>) -> Option<&T> {
        self.entries.get(&self.key(start, end, target))
    }

    pub fn has_keys(&self, start: i64, end: i64) -> bool {
        self.try_get(start, end).is_some()
    }

    /// Smallest cached window containing `[start, end]`.
    ///
    /// Only sound for results that stay valid on a superset window, e.g.
    /// index ranges that are clipped again by the caller.
    pub fn try_get_englobing(&self, start: i64, end: i64) -> Option<&T> {
        self.try_get_englobing_for(start, end, None)
    }

    pub fn try_get_englobing_for(&self, start: i64, end: i64, target: Option<AgentId>) -> Option<&T> {
        let query = self.key(start, end, target);
        self.entries
            .iter()
            .filter(|(k, _)| k.target == query.target && k.start <= query.start && k.end >= query.end)
            .min_by_key(|(k, _)| (std::cmp::Reverse(k.start), k.end))
            .map(|(_, v)| v)
    }

    pub fn get_or_insert_with(&mut self, start: i64, end: i64, compute: impl FnOnce() -> T) -> &T {
        let key = self.key(start, end, None);
        self.entries.entry(key).or_insert_with(compute)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let mut cache = TimeWindowCache::new(0, 10_000);
        cache.set(100, 500, 42);
        assert_eq!(cache.try_get(100, 500), Some(&42));
        assert_eq!(cache.try_get(100, 501), None);
        assert!(cache.has_keys(100, 500));
    }

    #[test]
    fn test_keys_are_normalized() {
        let mut cache = TimeWindowCache::new(0, 10_000);
        cache.set(500, 100, "swapped");
        assert_eq!(cache.try_get(100, 500), Some(&"swapped"));

        cache.set(-50, 20_000, "whole log");
        assert_eq!(cache.try_get(0, 10_000), Some(&"whole log"));
        assert_eq!(cache.normalize(20_000, -50), (0, 10_000));

        let once = cache.normalize(700, 30);
        assert_eq!(cache.normalize(once.0, once.1), once);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_targets_are_separate_entries() {
        let mut cache = TimeWindowCache::new(0, 1000);
        let target = Some(AgentId::from_index(3));
        cache.set(0, 100, 1);
        cache.set_for(0, 100, target, 2);
        assert_eq!(cache.try_get(0, 100), Some(&1));
        assert_eq!(cache.try_get_for(0, 100, target), Some(&2));
        assert_eq!(cache.try_get_for(0, 100, Some(AgentId::from_index(4))), None);
    }

    #[test]
    fn test_englobing_picks_tightest_container() {
        let mut cache = TimeWindowCache::new(0, 10_000);
        cache.set(0, 10_000, "log");
        cache.set(100, 900, "phase");
        cache.set(300, 400, "inner");

        assert_eq!(cache.try_get_englobing(200, 800), Some(&"phase"));
        assert_eq!(cache.try_get_englobing(300, 400), Some(&"inner"));
        assert_eq!(cache.try_get_englobing(50, 800), Some(&"log"));
        assert_eq!(cache.try_get_englobing_for(200, 800, Some(AgentId::from_index(1))), None);
    }

    #[test]
    fn test_get_or_insert_computes_once() {
        let mut cache = TimeWindowCache::new(0, 1000);
        let mut calls = 0;
        assert_eq!(*cache.get_or_insert_with(0, 10, || { calls += 1; 7 }), 7);
        assert_eq!(*cache.get_or_insert_with(10, 0, || { calls += 1; 8 }), 7);
        assert_eq!(calls, 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
