use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, PriceQuote, TokenMetadata};

#[async_trait]
pub trait MockPriceOracle: 'static + Send + Sync + Debug {
    fn new() -> Self
    where
        Self: Sized;

    async fn fetch_token_metadata(&self, _chain_id: &str, _symbol: &str) -> Result<TokenMetadata, Error> {
        unimplemented!()
    }

    async fn fetch_unit_price(&self, _chain_id: &str, _address: &str) -> Result<PriceQuote, Error> {
        unimplemented!()
    }
}

type Lookup = (String, String);

/// In-memory oracle answering from tables that tests can rewrite while it is in use.
/// Every lookup is counted and may be delayed to keep requests in flight.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    latency: Option<Duration>,

    metadata: Mutex<HashMap<Lookup, Result<TokenMetadata, Error>>>,
    prices: Mutex<HashMap<Lookup, Result<f64, Error>>>,

    metadata_calls: Mutex<HashMap<Lookup, usize>>,
    price_calls: Mutex<HashMap<Lookup, usize>>,
}

fn lookup(a: &str, b: &str) -> Lookup {
    (a.to_string(), b.to_string())
}

impl StaticPriceOracle {
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_metadata(self, metadata: TokenMetadata) -> Self {
        self.set_metadata(metadata);
        self
    }

    pub fn with_price(self, chain_id: &str, address: &str, unit_price: f64) -> Self {
        self.set_price(chain_id, address, unit_price);
        self
    }

    pub fn set_metadata(&self, metadata: TokenMetadata) {
        let key = lookup(&metadata.chain_id, &metadata.symbol);
        self.metadata.lock().unwrap_or_else(PoisonError::into_inner).insert(key, Ok(metadata));
    }

    pub fn set_metadata_error(&self, chain_id: &str, symbol: &str, error: Error) {
        let key = lookup(chain_id, symbol);
        self.metadata.lock().unwrap_or_else(PoisonError::into_inner).insert(key, Err(error));
    }

    pub fn set_price(&self, chain_id: &str, address: &str, unit_price: f64) {
        let key = lookup(chain_id, address);
        self.prices.lock().unwrap_or_else(PoisonError::into_inner).insert(key, Ok(unit_price));
    }

    pub fn set_price_error(&self, chain_id: &str, address: &str, error: Error) {
        let key = lookup(chain_id, address);
        self.prices.lock().unwrap_or_else(PoisonError::into_inner).insert(key, Err(error));
    }

    pub fn metadata_calls(&self, chain_id: &str, symbol: &str) -> usize {
        let calls = self.metadata_calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.get(&lookup(chain_id, symbol)).copied().unwrap_or_default()
    }

    pub fn price_calls(&self, chain_id: &str, address: &str) -> usize {
        let calls = self.price_calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.get(&lookup(chain_id, address)).copied().unwrap_or_default()
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl MockPriceOracle for StaticPriceOracle {
    fn new() -> Self {
        Self::default()
    }

    async fn fetch_token_metadata(&self, chain_id: &str, symbol: &str) -> Result<TokenMetadata, Error> {
        let key = lookup(chain_id, symbol);
        *self.metadata_calls.lock().unwrap_or_else(PoisonError::into_inner).entry(key.clone()).or_default() += 1;
        self.wait().await;

        let metadata = self.metadata.lock().unwrap_or_else(PoisonError::into_inner).get(&key).cloned();
        metadata.unwrap_or_else(|| {
            Err(Error::TokenNotFound {
                chain_id: chain_id.to_string(),
                symbol: symbol.to_string(),
            })
        })
    }

    async fn fetch_unit_price(&self, chain_id: &str, address: &str) -> Result<PriceQuote, Error> {
        if address.is_empty() {
            return Err(Error::MissingAddress);
        }

        let key = lookup(chain_id, address);
        *self.price_calls.lock().unwrap_or_else(PoisonError::into_inner).entry(key.clone()).or_default() += 1;
        self.wait().await;

        let price = self.prices.lock().unwrap_or_else(PoisonError::into_inner).get(&key).cloned();
        match price {
            Some(Ok(unit_price)) => PriceQuote::new(unit_price),
            Some(Err(error)) => Err(error),
            None => Err(Error::PriceNotFound {
                chain_id: chain_id.to_string(),
                address: address.to_string(),
            }),
        }
    }
}
