// ── Rate derivation ──
//
// Turns consecutive counter snapshots of one interface into byte rates and
// keeps a rolling rate history per interface for moving averages.

use std::hash::Hash;

use indexmap::{Equivalent, IndexMap};

use crate::model::{CounterKind, CounterSnapshot, RateAverage, TrafficRate};
use crate::store::{DEFAULT_WINDOW, RingBuffer, RollingHistoryStore};
use crate::units::nanos_to_secs;

/// Rate between the last two snapshots of `history`.
///
/// Absent with fewer than two snapshots, or when the elapsed time is not
/// positive (duplicate or out-of-order delivery). Counter decreases (reset,
/// wrap) clamp to a zero delta for that interval.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn derive(history: &RingBuffer<CounterSnapshot>) -> Option<TrafficRate> {
    let (prev, curr) = history.last_two()?;
    let dt_ns = curr.timestamp_ns.checked_sub(prev.timestamp_ns)?;
    if dt_ns <= 0 {
        return None;
    }
    let dt = nanos_to_secs(dt_ns);

    let d_in = curr.counters.in_octets.saturating_sub(prev.counters.in_octets);
    let d_out = curr.counters.out_octets.saturating_sub(prev.counters.out_octets);

    Some(TrafficRate {
        in_bytes_per_sec: d_in as f64 / dt,
        out_bytes_per_sec: d_out as f64 / dt,
    })
}

/// Per-key snapshot and rate histories.
#[derive(Debug, Clone)]
pub struct RateEngine<K> {
    snapshots: RollingHistoryStore<K, CounterSnapshot>,
    rates: RollingHistoryStore<K, TrafficRate>,
    /// Rate from the most recent observation; absent when it abstained.
    current: IndexMap<K, TrafficRate>,
}

impl<K: Hash + Eq + Clone> Default for RateEngine<K> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl<K: Hash + Eq + Clone> RateEngine<K> {
    pub fn new(window: usize) -> Self {
        Self {
            snapshots: RollingHistoryStore::new(window),
            rates: RollingHistoryStore::new(window),
            current: IndexMap::new(),
        }
    }

    /// Record a snapshot and derive the rate for the newest interval.
    ///
    /// A derived rate is appended to the key's rate history; an abstained
    /// interval leaves that history untouched.
    pub fn observe(&mut self, key: K, snapshot: CounterSnapshot) -> Option<TrafficRate> {
        self.snapshots.push(key.clone(), snapshot);
        let rate = self.snapshots.series(&key).and_then(derive);
        match rate {
            Some(r) => {
                self.rates.push(key.clone(), r);
                self.current.insert(key, r);
            }
            None => {
                self.current.shift_remove(&key);
            }
        }
        rate
    }

    /// Rate over the last two stored snapshots of `key`.
    pub fn derive<Q>(&self, key: &Q) -> Option<TrafficRate>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.snapshots.series(key).and_then(derive)
    }

    /// Rate produced by the latest observation of `key`.
    pub fn current<Q>(&self, key: &Q) -> Option<TrafficRate>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.current.get(key).copied()
    }

    pub fn snapshots(&self) -> &RollingHistoryStore<K, CounterSnapshot> {
        &self.snapshots
    }

    pub fn rates(&self) -> &RollingHistoryStore<K, TrafficRate> {
        &self.rates
    }

    pub fn latest_snapshot<Q>(&self, key: &Q) -> Option<&CounterSnapshot>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.snapshots.last(key)
    }

    /// Moving average over `key`'s rate history.
    pub fn average<Q>(&self, key: &Q) -> RateAverage
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        RateAverage::of(self.rates.get(key))
    }

    /// Raw values of one counter across `key`'s snapshot history.
    pub fn counter_series<Q>(&self, key: &Q, kind: CounterKind) -> Vec<u64>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.snapshots
            .get(key)
            .map(|s| s.counters.get(kind))
            .collect()
    }

    /// Keys in first-observed order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.snapshots.keys()
    }

    /// Discard every history.
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.rates.clear();
        self.current.clear();
    }
}
