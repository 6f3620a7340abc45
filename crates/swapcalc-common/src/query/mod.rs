//! Keyed query cache with stale-while-revalidate reads, request sharing, retries and
//! periodic refresh.
//!
//! A read of a fresh key is served from memory. A read of a stale key is served from
//! memory while a refresh runs in the background. A read of a missing or expired key
//! waits for the fetch. Requests for a key that is already being fetched join the
//! outstanding fetch instead of issuing a new one.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::cache::{ExpirableCache, SharedClock, Validity};

mod retry;
pub use retry::with_retry;

/// Whether a failed fetch is worth attempting again.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryPolicy {
    pub validity: Validity,
    /// Refresh period of watched keys. `None` disables watching.
    pub refresh_interval: Option<Duration>,
    /// Additional attempts after the first failure.
    pub retries: usize,
    pub backoff_start: Duration,
    pub backoff_max: Duration,
}

impl QueryPolicy {
    pub const METADATA: Self = Self {
        validity: Validity::new(Duration::from_secs(5 * 60), Duration::from_secs(10 * 60)),
        refresh_interval: None,
        retries: 2,
        backoff_start: Duration::from_secs(1),
        backoff_max: Duration::from_secs(30),
    };

    pub const PRICE: Self = Self {
        validity: Validity::new(Duration::from_secs(30), Duration::from_secs(2 * 60)),
        refresh_interval: Some(Duration::from_secs(30)),
        retries: 2,
        backoff_start: Duration::from_secs(1),
        backoff_max: Duration::from_secs(30),
    };
}

type Fetcher<V, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

pub struct QueryCache<K, V, E> {
    name: &'static str,
    policy: QueryPolicy,

    values: ExpirableCache<K, V>,
    in_flight: Arc<Mutex<HashMap<K, InFlight<V, E>>>>,
}

impl<K: Clone, V: Clone, E> Clone for QueryCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            policy: self.policy,
            values: self.values.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<K, V, E> QueryCache<K, V, E>
where
    K: 'static + Clone + Eq + Hash + Debug + Send + Sync,
    V: 'static + Clone + Send + Sync,
    E: 'static + Clone + Retryable + Display + Send + Sync,
{
    pub fn new(name: &'static str, policy: QueryPolicy, capacity: u64, clock: SharedClock) -> Self {
        Self {
            name,
            policy,

            values: ExpirableCache::new(capacity, clock),
            in_flight: Arc::default(),
        }
    }

    /// Returns the cached value, stale or not, without fetching.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.values.get_if_not_expired(key)
    }

    pub fn is_fresh(&self, key: &K) -> bool {
        self.values.get_if_not_stale(key).is_some()
    }

    pub fn is_fetching(&self, key: &K) -> bool {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    /// Reads `key`, fetching it when it is missing or expired and revalidating it in the
    /// background when it is stale.
    pub async fn fetch<F>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync + 'static,
    {
        let now = self.values.now();
        match self.values.get(&key) {
            Some(entry) if !entry.is_stale(now) => {
                debug!(cache = self.name, ?key, "fresh hit");
                Ok(entry.take())
            },
            Some(entry) => {
                debug!(cache = self.name, ?key, "stale hit, revalidating");
                let _ = self.shared(key, Arc::new(fetch));
                Ok(entry.take())
            },
            None => {
                debug!(cache = self.name, ?key, "miss");
                self.shared(key, Arc::new(fetch)).await
            },
        }
    }

    /// Fetches `key` regardless of what is cached, joining an outstanding fetch if any.
    pub async fn refetch<F>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync + 'static,
    {
        self.shared(key, Arc::new(fetch)).await
    }

    /// Marks every cached key matching `pattern` as stale so that its next read refetches.
    pub fn invalidate(&self, pattern: impl Fn(&K) -> bool) -> usize {
        let touched = self.values.mark_stale_if(pattern);
        debug!(cache = self.name, touched, "invalidated entries");

        touched
    }

    /// Refetches `key` every refresh interval of the policy and hands each result to
    /// `sink`, until the returned [`Subscription`] is dropped. Returns `None` when the
    /// policy has no refresh interval.
    pub fn watch<F, S>(&self, key: K, fetch: F, sink: S) -> Option<Subscription>
    where
        F: Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync + 'static,
        S: Fn(Result<V, E>) + Send + Sync + 'static,
    {
        let interval = self.policy.refresh_interval?;

        let cache = self.clone();
        let fetch: Fetcher<V, E> = Arc::new(fetch);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                debug!(cache = cache.name, ?key, "scheduled refresh");
                sink(cache.shared(key.clone(), fetch.clone()).await);
            }
        });

        Some(Subscription { task })
    }

    fn shared(&self, key: K, fetch: Fetcher<V, E>) -> InFlight<V, E> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(request) = in_flight.get(&key) {
            debug!(cache = self.name, ?key, "joining in-flight fetch");
            return request.clone();
        }

        let request = {
            let key = key.clone();
            let policy = self.policy;
            let values = self.values.clone();
            let in_flight = self.in_flight.clone();

            async move {
                let result = with_retry(&policy, fetch.as_ref()).await;
                if let Ok(value) = &result {
                    values.insert(key.clone(), value.clone(), policy.validity);
                }

                in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(&key);
                result
            }
            .boxed()
            .shared()
        };

        in_flight.insert(key, request.clone());

        // Driven to completion even when every caller stops waiting for it.
        tokio::spawn(request.clone());
        request
    }
}

/// Handle on a watched key. Dropping it stops the periodic refresh.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc;

    use super::*;
    use crate::cache::ManualClock;

    #[derive(Debug, Clone, PartialEq)]
    struct Unavailable;

    impl fmt::Display for Unavailable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "unavailable")
        }
    }

    impl Retryable for Unavailable {
        fn is_retryable(&self) -> bool {
            false
        }
    }

    type TestCache = QueryCache<&'static str, usize, Unavailable>;

    fn cache(policy: QueryPolicy) -> (TestCache, ManualClock) {
        let clock = ManualClock::new();
        (QueryCache::new("test", policy, 16, clock.shared()), clock)
    }

    /// Each call returns how many calls were made so far, after a short delay.
    fn counting(calls: Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, Result<usize, Unavailable>> + Send + Sync + 'static {
        move || {
            let calls = calls.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_values_are_served_without_fetching() {
        let (cache, clock) = cache(QueryPolicy::PRICE);
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.fetch("eth", counting(calls.clone())).await, Ok(1));

        clock.advance(Duration::from_secs(29));
        assert_eq!(cache.fetch("eth", counting(calls.clone())).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_values_and_in_flight_fetches() {
        // Given
        let (cache, _) = cache(QueryPolicy::PRICE);
        let other = cache.clone();
        let calls = Arc::new(AtomicUsize::new(0));

        // When
        let (a, b) = tokio::join!(cache.fetch("eth", counting(calls.clone())), other.fetch("eth", counting(calls.clone())));

        // Then
        assert_eq!((a, b), (Ok(1), Ok(1)));
        assert_eq!(other.peek(&"eth"), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_share_one_fetch() {
        let (cache, _) = cache(QueryPolicy::PRICE);
        let calls = Arc::new(AtomicUsize::new(0));

        let (first, second) = futures::join!(
            cache.fetch("eth", counting(calls.clone())),
            cache.fetch("eth", counting(calls.clone()))
        );

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_are_fetched_separately() {
        let (cache, _) = cache(QueryPolicy::PRICE);
        let calls = Arc::new(AtomicUsize::new(0));

        let (eth, usdc) = futures::join!(
            cache.fetch("eth", counting(calls.clone())),
            cache.fetch("usdc", counting(calls.clone()))
        );

        assert!(eth.is_ok() && usdc.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_values_are_served_while_revalidating() {
        let (cache, clock) = cache(QueryPolicy::PRICE);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch("eth", counting(calls.clone())).await.unwrap();
        clock.advance(Duration::from_secs(31));

        assert_eq!(cache.fetch("eth", counting(calls.clone())).await, Ok(1));
        assert!(cache.is_fetching(&"eth"));

        // Joins the background refresh rather than starting a third fetch.
        assert_eq!(cache.refetch("eth", counting(calls.clone())).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.peek(&"eth"), Some(2));
        assert!(cache.is_fresh(&"eth"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_values_are_fetched_again() {
        let (cache, clock) = cache(QueryPolicy::METADATA);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch("usdc", counting(calls.clone())).await.unwrap();
        clock.advance(Duration::from_secs(15 * 60));

        assert_eq!(cache.peek(&"usdc"), None);
        assert_eq!(cache.fetch("usdc", counting(calls.clone())).await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidated_values_are_refetched_on_next_read() {
        let (cache, _) = cache(QueryPolicy::PRICE);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch("eth", counting(calls.clone())).await.unwrap();
        cache.fetch("usdc", counting(calls.clone())).await.unwrap();

        assert_eq!(cache.invalidate(|key| *key == "eth"), 1);
        assert!(!cache.is_fresh(&"eth"));
        assert!(cache.is_fresh(&"usdc"));

        cache.fetch("eth", counting(calls.clone())).await.unwrap();
        assert!(cache.is_fetching(&"eth"));
        assert!(!cache.is_fetching(&"usdc"));
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_not_cached() {
        let (cache, _) = cache(QueryPolicy::METADATA);
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Unavailable) }.boxed()
            }
        };

        assert_eq!(cache.fetch("wbtc", failing.clone()).await, Err(Unavailable));
        assert_eq!(cache.fetch("wbtc", failing).await, Err(Unavailable));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_fetching(&"wbtc"));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_refreshes_until_dropped() {
        let (cache, _) = cache(QueryPolicy::PRICE);
        let calls = Arc::new(AtomicUsize::new(0));
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let subscription = cache
            .watch("eth", counting(calls.clone()), move |result| {
                let _ = sender.send(result);
            })
            .unwrap();

        assert_eq!(receiver.recv().await, Some(Ok(1)));
        assert_eq!(receiver.recv().await, Some(Ok(2)));
        assert!(subscription.is_active());

        drop(subscription);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn watch_requires_a_refresh_interval() {
        let (cache, _) = cache(QueryPolicy::METADATA);

        assert!(cache.watch("usdc", counting(Arc::default()), |_| {}).is_none());
    }
}
