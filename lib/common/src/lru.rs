use rustc_hash::FxHashMap;
use std::hash::Hash;

/// A small bounded map with least-recently-used eviction.
///
/// Entries carry the tick of their last access; when the map is full the
/// entry with the smallest tick is evicted. Eviction scans the map, which is
/// O(capacity) — the capacities used here (datatype cache, parse memo) are
/// small enough that a linked structure would not pay for itself.
#[derive(Debug)]
pub struct LruMap<K, V> {
    entries: FxHashMap<K, Entry<V>>,
    capacity: usize,
    tick: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    last_used: u64,
}

impl<K: Eq + Hash + Clone, V> LruMap<K, V> {
    /// Creates a map bounded to `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity: capacity.max(1),
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Looks up `key`, refreshing its recency and counting the hit or miss.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.tick += 1;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = self.tick;
                self.hits += 1;
                Some(&entry.value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Checks for `key` without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Inserts `key`, evicting the least-recently-used entry when full.
    /// Duplicate puts simply refresh the value.
    pub fn insert(&mut self, key: K, value: V) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            key,
            Entry {
                value,
                last_used: self.tick,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut map = LruMap::new(2);
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.get(&"a"), Some(&1));
        map.insert("c", 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map.peek(&"b"), None);
        assert_eq!(map.peek(&"a"), Some(&1));
        assert_eq!(map.peek(&"c"), Some(&3));
    }

    #[test]
    fn duplicate_puts_refresh_in_place() {
        let mut map = LruMap::new(2);
        map.insert("a", 1);
        map.insert("a", 10);
        assert_eq!(map.len(), 1);
        assert_eq!(map.peek(&"a"), Some(&10));
    }

    #[test]
    fn counts_hits_and_misses() {
        let mut map = LruMap::new(4);
        map.insert("a", 1);
        assert!(map.get(&"a").is_some());
        assert!(map.get(&"b").is_none());
        assert_eq!(map.hits(), 1);
        assert_eq!(map.misses(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut map = LruMap::new(0);
        map.insert("a", 1);
        assert_eq!(map.capacity(), 1);
        assert_eq!(map.len(), 1);
    }
}
