//! Reuse of converted geometry within one batch.
//!
//! Entries hold their host geometry weakly. While a keep-alive region is
//! open every entry is pinned with a strong reference; when the outermost
//! region closes, entries that were not hit during it lose their pin and
//! become collectible as soon as the caller drops its own handles. Dead
//! entries are purged on every region end and treated as misses on lookup.
//!
//! ```ignore
//! let mut cache = GeometryCache::new(CachePolicy::Performance);
//! cache.begin_region();
//! if cache.try_get(key).is_none() {
//!     cache.add(key, &handle);
//! }
//! cache.end_region();
//! ```

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::host::{HostGeometry, HostHandle};

use super::config::CachePolicy;
use super::signature::GeometrySignature;

#[derive(Debug)]
struct CacheEntry {
    pinned: Option<HostHandle>,
    target: Weak<HostGeometry>,
    hit: bool,
}

/// Hit/miss counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Lookups that found an entry whose geometry had already been reclaimed.
    pub stale: usize,
    pub purged: usize,
}

#[derive(Debug)]
pub struct GeometryCache {
    policy: CachePolicy,
    entries: HashMap<GeometrySignature, CacheEntry>,
    depth: usize,
    stats: CacheStats,
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl GeometryCache {
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
            depth: 0,
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Switching to [`CachePolicy::Disabled`] drops every entry.
    pub fn set_policy(&mut self, policy: CachePolicy) {
        self.policy = policy;
        if policy == CachePolicy::Disabled {
            self.entries.clear();
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.policy != CachePolicy::Disabled
    }

    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn in_region(&self) -> bool {
        self.depth > 0
    }

    /// Live geometry for `key`, marking the entry as hit.
    pub fn try_get(&mut self, key: GeometrySignature) -> Option<HostHandle> {
        if !self.is_enabled() {
            return None;
        }
        let Some(entry) = self.entries.get_mut(&key) else {
            self.stats.misses += 1;
            return None;
        };
        if let Some(handle) = entry.target.upgrade() {
            entry.hit = true;
            self.stats.hits += 1;
            log::debug!("cache hit {:016x}", key.0);
            return Some(handle);
        }
        self.entries.remove(&key);
        self.stats.stale += 1;
        self.stats.misses += 1;
        None
    }

    /// Records `value` under `key`. Inside a region the entry is pinned.
    pub fn add(&mut self, key: GeometrySignature, value: &HostHandle) {
        if !self.is_enabled() {
            return;
        }
        let pinned = (self.in_region() || self.policy == CachePolicy::Extreme).then(|| Rc::clone(value));
        self.entries.insert(
            key,
            CacheEntry {
                pinned,
                target: Rc::downgrade(value),
                hit: true,
            },
        );
    }

    /// Opens a region. Returns `false` for nested regions, which change nothing.
    pub fn begin_region(&mut self) -> bool {
        self.depth += 1;
        if self.depth > 1 {
            return false;
        }
        for entry in self.entries.values_mut() {
            entry.pinned = entry.target.upgrade();
            entry.hit = false;
        }
        true
    }

    /// Closes a region; the outermost one unpins unhit entries and purges
    /// reclaimed ones.
    pub fn end_region(&mut self) {
        match self.depth {
            0 => return,
            1 => self.depth = 0,
            _ => {
                self.depth -= 1;
                return;
            }
        }
        if self.policy != CachePolicy::Extreme {
            for entry in self.entries.values_mut().filter(|e| !e.hit) {
                entry.pinned = None;
            }
        }
        self.purge();
    }

    /// Drops entries whose geometry has been reclaimed.
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.target.strong_count() > 0);
        let purged = before - self.entries.len();
        self.stats.purged += purged;
        if purged > 0 {
            log::debug!("purged {purged} reclaimed cache entries");
        }
        purged
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point3;

    fn handle(x: f64) -> HostHandle {
        Rc::new(HostGeometry::Point(Point3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn entries_outside_a_region_are_weak() {
        let mut cache = GeometryCache::default();
        let key = GeometrySignature(1);
        let value = handle(1.0);
        cache.add(key, &value);
        assert!(cache.try_get(key).is_some());
        drop(value);
        assert!(cache.try_get(key).is_none());
        assert_eq!(cache.stats().stale, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn region_pins_until_it_ends() {
        let mut cache = GeometryCache::default();
        let key = GeometrySignature(2);
        assert!(cache.begin_region());
        cache.add(key, &handle(2.0));
        assert!(cache.try_get(key).is_some());
        cache.end_region();
        // Hit during the region: still pinned.
        assert_eq!(cache.len(), 1);

        assert!(cache.begin_region());
        cache.end_region();
        // No hit this time: unpinned and purged.
        assert!(cache.try_get(key).is_none());
        assert_eq!(cache.stats().purged, 1);
    }

    #[test]
    fn nested_regions_do_nothing() {
        let mut cache = GeometryCache::default();
        let key = GeometrySignature(3);
        cache.begin_region();
        cache.add(key, &handle(3.0));
        assert!(!cache.begin_region());
        cache.end_region();
        assert!(cache.in_region());
        cache.end_region();
        assert!(!cache.in_region());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn extreme_policy_never_unpins() {
        let mut cache = GeometryCache::new(CachePolicy::Extreme);
        let key = GeometrySignature(4);
        cache.add(key, &handle(4.0));
        for _ in 0..3 {
            cache.begin_region();
            cache.end_region();
        }
        assert!(cache.try_get(key).is_some());
    }

    #[test]
    fn disabled_policy_bypasses_everything() {
        let mut cache = GeometryCache::new(CachePolicy::Disabled);
        let value = handle(5.0);
        cache.add(GeometrySignature(5), &value);
        assert!(cache.try_get(GeometrySignature(5)).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
