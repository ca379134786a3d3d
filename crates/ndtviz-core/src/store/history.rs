use std::hash::Hash;

use indexmap::{Equivalent, IndexMap};

use super::ring::{Iter, RingBuffer};

/// Capacity of every rolling series unless configured otherwise.
pub const DEFAULT_WINDOW: usize = 120;

/// Per-key rolling histories sharing one window size.
///
/// A key's buffer is created on first push. Keys iterate in the order they
/// were first observed. Memory is bounded at `keys × window`.
#[derive(Debug, Clone)]
pub struct RollingHistoryStore<K, T> {
    window: usize,
    series: IndexMap<K, RingBuffer<T>>,
}

impl<K: Hash + Eq, T> Default for RollingHistoryStore<K, T> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl<K: Hash + Eq, T> RollingHistoryStore<K, T> {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            series: IndexMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Append to `key`'s history, evicting its oldest entry when full.
    pub fn push(&mut self, key: K, value: T) {
        let window = self.window;
        self.series
            .entry(key)
            .or_insert_with(|| RingBuffer::new(window))
            .push(value);
    }

    /// History for `key`, oldest first. Unknown keys yield nothing.
    pub fn get<Q>(&self, key: &Q) -> Iter<'_, T>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        match self.series.get(key) {
            Some(ring) => ring.iter(),
            None => {
                let empty: &[T] = Default::default();
                empty.iter().chain(empty.iter())
            }
        }
    }

    /// Backing buffer for `key`, if it has been observed.
    pub fn series<Q>(&self, key: &Q) -> Option<&RingBuffer<T>>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.series.get(key)
    }

    pub fn len_of<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.series.get(key).map_or(0, RingBuffer::len)
    }

    pub fn last<Q>(&self, key: &Q) -> Option<&T>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.series.get(key).and_then(RingBuffer::last)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.series.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &RingBuffer<T>)> {
        self.series.iter()
    }

    pub fn key_count(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Drop every key and its history.
    pub fn clear(&mut self) {
        self.series.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_empty_not_error() {
        let store: RollingHistoryStore<String, u32> = RollingHistoryStore::new(4);
        assert_eq!(store.get("nope").count(), 0);
        assert_eq!(store.len_of("nope"), 0);
        assert!(store.last("nope").is_none());
    }

    #[test]
    fn per_key_insertion_order_and_bound() {
        let mut store = RollingHistoryStore::new(3);
        for i in 0..5 {
            store.push("a".to_string(), i);
            store.push("b".to_string(), i * 10);
        }
        assert_eq!(store.get("a").copied().collect::<Vec<_>>(), [2, 3, 4]);
        assert_eq!(store.get("b").copied().collect::<Vec<_>>(), [20, 30, 40]);
        assert_eq!(store.last("b"), Some(&40));
        assert_eq!(store.key_count(), 2);
    }

    #[test]
    fn keys_keep_first_seen_order() {
        let mut store = RollingHistoryStore::new(2);
        store.push("z", 1);
        store.push("a", 1);
        store.push("z", 2);
        assert_eq!(store.keys().copied().collect::<Vec<_>>(), ["z", "a"]);
    }

    #[test]
    fn clear_discards_everything() {
        let mut store = RollingHistoryStore::new(2);
        store.push(1_u8, 'x');
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.get(&1_u8).count(), 0);
    }

    #[test]
    fn default_window_is_120() {
        let store: RollingHistoryStore<u8, u8> = RollingHistoryStore::default();
        assert_eq!(store.window(), DEFAULT_WINDOW);
        assert_eq!(DEFAULT_WINDOW, 120);
    }
}
