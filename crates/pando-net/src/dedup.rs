//! Duplicate query suppression

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

/// Default number of query ids remembered before the oldest are recycled.
pub const DEFAULT_SEEN_CAPACITY: usize = 65_536;

/// Bounded set of already-processed query ids.
///
/// Flood forwarding relies on every node processing a given id at most
/// once. Ids are remembered in insertion order; past the capacity the
/// oldest are dropped. An id is only re-offered while its broadcast is
/// still propagating, so a generous capacity outlives any flood.
#[derive(Debug)]
pub struct SeenCache {
    inner: Mutex<SeenInner>,
    capacity: usize,
}

#[derive(Debug)]
struct SeenInner {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenCache {
    /// Create a cache remembering up to `capacity` ids
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SeenInner {
                ids: HashSet::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Record an id, returning `false` when it was already present.
    ///
    /// Membership check and insertion happen under one lock, so two
    /// concurrent offers of the same id can never both observe it as new.
    pub fn insert(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.ids.contains(id) {
            return false;
        }
        inner.ids.insert(id.to_string());
        inner.order.push_back(id.to_string());
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.ids.remove(&oldest);
            }
        }
        true
    }

    /// Check membership without recording
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().ids.contains(id)
    }

    /// Number of remembered ids
    pub fn len(&self) -> usize {
        self.inner.lock().ids.len()
    }

    /// Whether no ids are remembered
    pub fn is_empty(&self) -> bool {
        self.inner.lock().ids.is_empty()
    }
}

impl Default for SeenCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_then_duplicate() {
        let cache = SeenCache::new(16);
        assert!(cache.insert("q-1"));
        assert!(!cache.insert("q-1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_contains_does_not_record() {
        let cache = SeenCache::new(16);
        assert!(!cache.contains("q-1"));
        assert!(cache.is_empty());
        assert!(cache.insert("q-1"));
        assert!(cache.contains("q-1"));
    }

    #[test]
    fn test_oldest_ids_are_evicted() {
        let cache = SeenCache::new(3);
        assert!(cache.insert("a"));
        assert!(cache.insert("b"));
        assert!(cache.insert("c"));
        assert!(cache.insert("d"));

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("d"));

        // An evicted id counts as new again.
        assert!(cache.insert("a"));
    }

    #[test]
    fn test_capacity_of_one() {
        let cache = SeenCache::new(1);
        assert!(cache.insert("a"));
        assert!(cache.insert("b"));
        assert!(!cache.contains("a"));
        assert!(!cache.insert("b"));
    }

    #[test]
    fn test_concurrent_inserts_admit_exactly_one() {
        let cache = Arc::new(SeenCache::new(1024));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || cache.insert("q-race") as usize));
        }
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 1);
    }
}
