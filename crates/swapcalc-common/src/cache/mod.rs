use std::hash::Hash;
use std::ops::Deref;
use std::time::{Duration, Instant};

use moka::sync::Cache;

mod clock;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

/// How long a value stays fresh, and how long it is kept around once stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub stale_after: Duration,
    pub retain_for: Duration,
}

impl Validity {
    pub const fn new(stale_after: Duration, retain_for: Duration) -> Self {
        Self { stale_after, retain_for }
    }
}

/// Represents data that becomes stale or expired over time.
///
/// - After `stale_after`, the value is considered **stale** (may still be served).
/// - After `stale_after + retain_for`, the value is considered **expired** (unusable).
#[derive(Clone, Debug)]
pub struct Expirable<T> {
    /// Time at which the value becomes stale but still usable.
    stale_at: Instant,
    /// Time at which the value becomes expired and must not be used.
    expired_at: Instant,
    value: T,
}

impl<T> Deref for Expirable<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> Expirable<T> {
    pub fn new(value: T, fetched_at: Instant, validity: Validity) -> Self {
        let stale_at = fetched_at + validity.stale_after;

        Self {
            stale_at,
            expired_at: stale_at + validity.retain_for,
            value,
        }
    }

    /// Returns true if the value is stale (past soft expiration).
    pub fn is_stale(&self, now: Instant) -> bool {
        now >= self.stale_at
    }

    /// Returns true if the value is expired (past hard expiration).
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expired_at
    }

    /// Moves the soft expiration to `now`, keeping the hard expiration untouched.
    pub fn mark_stale(&mut self, now: Instant) {
        self.stale_at = self.stale_at.min(now);
    }

    /// Consumes the container and returns the inner value.
    pub fn take(self) -> T {
        self.value
    }
}

/// A bounded cache with values that can become stale or expired over time.
/// Expired values are never returned and get evicted on access.
#[derive(Clone)]
pub struct ExpirableCache<K, V> {
    cache: Cache<K, Expirable<V>>,
    clock: SharedClock,
}

impl<K, V> ExpirableCache<K, V>
where
    K: 'static + Clone + Eq + Hash + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    pub fn new(capacity: u64, clock: SharedClock) -> Self {
        Self {
            cache: Cache::new(capacity),
            clock,
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Returns the entry if it exists and is not expired.
    pub fn get(&self, key: &K) -> Option<Expirable<V>> {
        let entry = self.cache.get(key)?;
        if entry.is_expired(self.now()) {
            self.cache.invalidate(key);
            return None;
        }

        Some(entry)
    }

    /// Returns the value if it exists and is not stale.
    pub fn get_if_not_stale(&self, key: &K) -> Option<V> {
        let now = self.now();
        self.get(key).filter(|x| !x.is_stale(now)).map(Expirable::take)
    }

    /// Returns the value if it exists and is not expired.
    pub fn get_if_not_expired(&self, key: &K) -> Option<V> {
        self.get(key).map(Expirable::take)
    }

    pub fn insert(&self, key: K, value: V, validity: Validity) {
        self.cache.insert(key, Expirable::new(value, self.now(), validity));
    }

    /// Marks every entry whose key matches as stale. Returns how many entries were touched.
    pub fn mark_stale_if(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let now = self.now();

        let mut touched = 0;
        for (key, mut entry) in self.cache.iter() {
            if !predicate(&key) {
                continue;
            }

            entry.mark_stale(now);
            self.cache.insert(K::clone(&key), entry);
            touched += 1;
        }

        touched
    }
}
