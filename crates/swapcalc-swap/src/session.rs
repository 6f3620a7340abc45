use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use swapcalc_common::cache::SharedClock;
use swapcalc_common::query::{QueryCache, QueryPolicy, Subscription};
use swapcalc_prices::{Error, MetadataKey, PriceKey, PriceOracle, PriceQuote, TokenMetadata};
use tokio::sync::mpsc;
use tracing::debug;

use crate::reducer::{reduce, Effect, Event};
use crate::state::{Side, SwapState};

const CACHE_CAPACITY: u64 = 1024;

/// Lookup caches, shareable between sessions.
#[derive(Clone)]
pub struct Caches {
    pub metadata: QueryCache<MetadataKey, TokenMetadata, Error>,
    pub prices: QueryCache<PriceKey, PriceQuote, Error>,
}

impl Caches {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            metadata: QueryCache::new("metadata", QueryPolicy::METADATA, CACHE_CAPACITY, clock.clone()),
            prices: QueryCache::new("prices", QueryPolicy::PRICE, CACHE_CAPACITY, clock),
        }
    }
}

enum Message {
    Resolved(Event),
    Finished,
}

/// Drives a [`SwapState`]: user events go through [`SwapSession::dispatch`], lookups run
/// in the background and their results are applied by [`SwapSession::next`].
pub struct SwapSession {
    oracle: Arc<dyn PriceOracle>,
    caches: Caches,

    state: SwapState,
    subscriptions: HashMap<Side, Subscription>,

    pending: usize,
    sender: mpsc::UnboundedSender<Message>,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl SwapSession {
    pub fn new(oracle: Arc<dyn PriceOracle>, clock: SharedClock) -> Self {
        Self::with_caches(oracle, Caches::new(clock))
    }

    pub fn with_caches(oracle: Arc<dyn PriceOracle>, caches: Caches) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            oracle,
            caches,

            state: SwapState::default(),
            subscriptions: HashMap::new(),

            pending: 0,
            sender,
            receiver,
        }
    }

    pub fn state(&self) -> &SwapState {
        &self.state
    }

    /// Number of lookups whose results have not been applied yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_subscribed(&self, side: Side) -> bool {
        self.subscriptions.get(&side).is_some_and(Subscription::is_active)
    }

    /// Applies `event` and starts the lookups it requires. Must be called within a tokio runtime.
    pub fn dispatch(&mut self, event: Event) {
        for effect in reduce(&mut self.state, event) {
            self.run(effect);
        }
    }

    /// Waits for the next lookup result and applies it.
    pub async fn next(&mut self) -> &SwapState {
        while let Some(message) = self.receiver.recv().await {
            match message {
                Message::Resolved(event) => {
                    self.dispatch(event);
                    break;
                },
                Message::Finished => self.pending -= 1,
            }
        }

        &self.state
    }

    /// Applies results until every started lookup has completed. Periodic refreshes do not
    /// count as started lookups.
    pub async fn settle(&mut self) -> &SwapState {
        while self.pending > 0 {
            match self.receiver.recv().await {
                Some(Message::Resolved(event)) => self.dispatch(event),
                Some(Message::Finished) => self.pending -= 1,
                None => break,
            }
        }

        &self.state
    }

    fn run(&mut self, effect: Effect) {
        debug!(?effect, "running effect");

        match effect {
            Effect::FetchMetadata(key) => {
                let fetch = metadata_fetcher(self.oracle.clone(), key.clone());
                self.spawn(self.caches.metadata.clone(), key, fetch, |key, result| Event::MetadataResolved { key, result });
            },
            Effect::FetchPrice(key) => {
                let fetch = price_fetcher(self.oracle.clone(), key.clone());
                self.spawn(self.caches.prices.clone(), key, fetch, |key, result| Event::PriceResolved { key, result });
            },
            Effect::InvalidateMetadata(key) => {
                self.caches.metadata.invalidate(|x| x == &key);
            },
            Effect::InvalidatePrice(key) => {
                self.caches.prices.invalidate(|x| x == &key);
            },
            Effect::Subscribe { side, key } => {
                let sender = self.sender.clone();
                let fetch = price_fetcher(self.oracle.clone(), key.clone());
                let sink = {
                    let key = key.clone();
                    move |result| {
                        let _ = sender.send(Message::Resolved(Event::PriceResolved { key: key.clone(), result }));
                    }
                };

                match self.caches.prices.watch(key, fetch, sink) {
                    Some(subscription) => {
                        self.subscriptions.insert(side, subscription);
                    },
                    None => {
                        self.subscriptions.remove(&side);
                    },
                }
            },
            Effect::Unsubscribe { side } => {
                self.subscriptions.remove(&side);
            },
        }
    }

    /// Reads `key` through `cache` and posts the result. A stale read posts the cached value
    /// first and the revalidated one after.
    fn spawn<K, V, F>(&mut self, cache: QueryCache<K, V, Error>, key: K, fetch: F, resolved: fn(K, Result<V, Error>) -> Event)
    where
        K: 'static + Clone + Eq + Hash + Debug + Send + Sync,
        V: 'static + Clone + Send + Sync,
        F: Fn() -> BoxFuture<'static, Result<V, Error>> + Clone + Send + Sync + 'static,
    {
        self.pending += 1;
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let revalidating = cache.peek(&key).is_some() && !cache.is_fresh(&key);

            let result = cache.fetch(key.clone(), fetch.clone()).await;
            let _ = sender.send(Message::Resolved(resolved(key.clone(), result)));

            if revalidating {
                let result = cache.refetch(key.clone(), fetch).await;
                let _ = sender.send(Message::Resolved(resolved(key, result)));
            }

            let _ = sender.send(Message::Finished);
        });
    }
}

fn metadata_fetcher(
    oracle: Arc<dyn PriceOracle>,
    key: MetadataKey,
) -> impl Fn() -> BoxFuture<'static, Result<TokenMetadata, Error>> + Clone + Send + Sync + 'static {
    move || {
        let oracle = oracle.clone();
        let key = key.clone();
        async move { oracle.fetch_token_metadata(&key.chain_id, &key.symbol).await }.boxed()
    }
}

fn price_fetcher(
    oracle: Arc<dyn PriceOracle>,
    key: PriceKey,
) -> impl Fn() -> BoxFuture<'static, Result<PriceQuote, Error>> + Clone + Send + Sync + 'static {
    move || {
        let oracle = oracle.clone();
        let key = key.clone();
        async move { oracle.fetch_unit_price(&key.chain_id, &key.address).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use swapcalc_common::cache::ManualClock;
    use swapcalc_prices::mock::StaticPriceOracle;
    use swapcalc_prices::tokens::{find_token, Token};
    use swapcalc_prices::{Client, ErrorKind};

    use super::*;
    use crate::reducer::Query;
    use crate::state::Field;

    fn metadata(symbol: &str, chain_id: &str, address: &str, decimals: u8) -> TokenMetadata {
        TokenMetadata {
            symbol: symbol.to_string(),
            chain_id: chain_id.to_string(),
            address: address.to_string(),
            name: symbol.to_string(),
            decimals,
        }
    }

    fn oracle() -> Arc<StaticPriceOracle> {
        Arc::new(
            StaticPriceOracle::default()
                .with_latency(Duration::from_millis(100))
                .with_metadata(metadata("UNI", "1", "0x1f98", 18))
                .with_metadata(metadata("LINK", "1", "0x5149", 18))
                .with_metadata(metadata("WBTC", "1", "0x2260", 8))
                .with_price("1", "0x1f98", 2.0)
                .with_price("1", "0x5149", 4.0)
                .with_price("1", "0x2260", 60_000.0),
        )
    }

    fn new_session(oracle: &Arc<StaticPriceOracle>) -> SwapSession {
        SwapSession::new(Arc::new(Client::from_mock(oracle.clone())), ManualClock::new().shared())
    }

    fn token(symbol: &str) -> Token {
        find_token(symbol, "1").unwrap()
    }

    fn select(session: &mut SwapSession, side: Side, symbol: &str) {
        session.dispatch(Event::SelectToken { side, token: token(symbol) });
    }

    fn edit(session: &mut SwapSession, field: Field, raw: &str) {
        session.dispatch(Event::Edit {
            field,
            raw: raw.to_string(),
        });
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_tokens_and_converts() {
        // Given
        let oracle = oracle();
        let mut session = new_session(&oracle);

        // When
        select(&mut session, Side::Source, "UNI");
        select(&mut session, Side::Target, "LINK");
        edit(&mut session, Field::SourceAmount, "100");
        assert!(session.state().is_loading());
        let state = session.settle().await;

        // Then
        assert!(!state.is_loading());
        assert_eq!(state.rate(), Some(0.5));
        assert_eq!(state.source.usd, "200.00");
        assert_eq!(state.target.amount, "50");
        assert_eq!(state.target.usd, "200.00");
        assert!(session.is_subscribed(Side::Source));
        assert!(session.is_subscribed(Side::Target));
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_share_in_flight_lookups() {
        let oracle = oracle();
        let caches = Caches::new(ManualClock::new().shared());
        let mut first = SwapSession::with_caches(Arc::new(Client::from_mock(oracle.clone())), caches.clone());
        let mut second = SwapSession::with_caches(Arc::new(Client::from_mock(oracle.clone())), caches);

        select(&mut first, Side::Source, "UNI");
        select(&mut second, Side::Target, "UNI");
        first.settle().await;
        second.settle().await;

        assert_eq!(oracle.metadata_calls("1", "UNI"), 1);
        assert_eq!(oracle.price_calls("1", "0x1f98"), 1);
        assert_eq!(first.state().source.unit_price(), Some(2.0));
        assert_eq!(second.state().target.unit_price(), Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_token_does_not_land() {
        let oracle = oracle();
        let mut session = new_session(&oracle);

        select(&mut session, Side::Source, "UNI");
        select(&mut session, Side::Source, "WBTC");
        let state = session.settle().await;

        assert_eq!(state.source.token.as_ref().map(|x| x.address.as_str()), Some("0x2260"));
        assert_eq!(state.source.unit_price(), Some(60_000.0));
        assert_eq!(oracle.price_calls("1", "0x1f98"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flip_revalidates_both_prices() {
        // Given
        let oracle = oracle();
        let mut session = new_session(&oracle);
        select(&mut session, Side::Source, "UNI");
        select(&mut session, Side::Target, "LINK");
        edit(&mut session, Field::SourceUsd, "100");
        session.settle().await;
        oracle.set_price("1", "0x1f98", 2.5);

        // When
        session.dispatch(Event::Flip);
        let state = session.settle().await;

        // Then
        assert_eq!(oracle.price_calls("1", "0x1f98"), 2);
        assert_eq!(oracle.price_calls("1", "0x5149"), 2);
        assert_eq!(state.target.unit_price(), Some(2.5));
        assert_eq!(state.last_edited, Some(Field::TargetUsd));
        assert_eq!(state.target.amount, "40");
        assert_eq!(state.source.amount, "25");
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_follows_price_changes() {
        let oracle = oracle();
        let mut session = new_session(&oracle);
        select(&mut session, Side::Source, "UNI");
        select(&mut session, Side::Target, "LINK");
        edit(&mut session, Field::SourceAmount, "100");
        session.settle().await;

        // Both sides refresh on the same tick.
        oracle.set_price("1", "0x5149", 8.0);
        session.next().await;
        let state = session.next().await;

        assert_eq!(state.target.unit_price(), Some(8.0));
        assert_eq!(state.target.amount, "25");
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_a_token_drops_its_subscription() {
        let oracle = oracle();
        let mut session = new_session(&oracle);
        select(&mut session, Side::Source, "UNI");
        session.settle().await;
        assert!(session.is_subscribed(Side::Source));

        select(&mut session, Side::Source, "AAVE");

        assert!(!session.is_subscribed(Side::Source));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_api_key_is_not_retryable() {
        let oracle = oracle();
        oracle.set_metadata_error("1", "LINK", Error::Config);
        let mut session = new_session(&oracle);

        select(&mut session, Side::Target, "LINK");
        let state = session.settle().await;

        assert_eq!(state.side_error(Side::Target).map(Error::kind), Some(ErrorKind::Config));
        assert!(!state.can_retry(Side::Target));
        assert_eq!(oracle.metadata_calls("1", "LINK"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_a_failed_price() {
        // Given
        let oracle = oracle();
        oracle.set_price_error("1", "0x5149", Error::Transport("connection reset".to_string()));
        let mut session = new_session(&oracle);
        select(&mut session, Side::Target, "LINK");
        session.settle().await;
        assert!(session.state().can_retry(Side::Target));
        assert_eq!(oracle.price_calls("1", "0x5149"), 3);

        // When
        oracle.set_price("1", "0x5149", 4.0);
        session.dispatch(Event::Retry {
            side: Side::Target,
            query: Query::Price,
        });
        let state = session.settle().await;

        // Then
        assert_eq!(state.side_error(Side::Target), None);
        assert_eq!(state.target.unit_price(), Some(4.0));
    }
}
