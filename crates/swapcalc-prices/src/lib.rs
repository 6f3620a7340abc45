use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swapcalc_common::concurrency::ConcurrentExecutor;
use swapcalc_common::{log_if_error, task};
use tracing::instrument;

use crate::funkit::{FunkitConfiguration, FunkitPriceOracle};

mod error;
pub use error::{Error, ErrorKind};

pub mod funkit;
pub mod math;
pub mod tokens;

#[cfg(feature = "testing")]
pub mod mock;

const BATCH_WORKERS: usize = 8;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenMetadata {
    pub symbol: String,
    pub chain_id: String,
    pub address: String,
    pub name: String,
    pub decimals: u8,
}

/// A validated unit price in USD, always finite and strictly positive.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PriceQuote {
    pub unit_price: f64,
}

impl PriceQuote {
    pub fn new(unit_price: f64) -> Result<Self, Error> {
        if !unit_price.is_finite() || unit_price <= 0.0 {
            return Err(Error::InvalidPrice(unit_price.to_string()));
        }

        Ok(Self { unit_price })
    }
}

/// Identifies a metadata lookup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    pub chain_id: String,
    pub symbol: String,
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.symbol)
    }
}

/// Identifies a price lookup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub chain_id: String,
    pub address: String,
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.address)
    }
}

#[async_trait]
pub trait PriceOracle: 'static + Send + Sync {
    async fn fetch_token_metadata(&self, chain_id: &str, symbol: &str) -> Result<TokenMetadata, Error>;

    async fn fetch_unit_price(&self, chain_id: &str, address: &str) -> Result<PriceQuote, Error>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum Configuration {
    #[cfg(feature = "testing")]
    #[serde(skip)]
    Mock(std::sync::Arc<dyn mock::MockPriceOracle>),

    Funkit(FunkitConfiguration),
}

impl Default for Configuration {
    fn default() -> Self {
        Self::Funkit(FunkitConfiguration::default())
    }
}

#[cfg(feature = "testing")]
impl Configuration {
    pub fn mock<T: mock::MockPriceOracle>() -> Self {
        Self::Mock(std::sync::Arc::new(T::new()))
    }
}

#[derive(Clone)]
pub enum Client {
    #[cfg(feature = "testing")]
    Mock(std::sync::Arc<dyn mock::MockPriceOracle>),

    Funkit(FunkitPriceOracle),
}

impl Client {
    pub fn new(configuration: &Configuration) -> Result<Self, Error> {
        Ok(match configuration {
            #[cfg(feature = "testing")]
            Configuration::Mock(x) => Self::Mock(x.clone()),

            Configuration::Funkit(x) => Self::Funkit(FunkitPriceOracle::new(x)?),
        })
    }

    #[cfg(feature = "testing")]
    pub fn from_mock(oracle: std::sync::Arc<dyn mock::MockPriceOracle>) -> Self {
        Self::Mock(oracle)
    }

    #[instrument(name = "fetch_token_metadata", skip(self))]
    pub async fn fetch_token_metadata(&self, chain_id: &str, symbol: &str) -> Result<TokenMetadata, Error> {
        log_if_error!(match self {
            #[cfg(feature = "testing")]
            Self::Mock(oracle) => oracle.fetch_token_metadata(chain_id, symbol).await,

            Self::Funkit(oracle) => oracle.fetch_token_metadata(chain_id, symbol).await,
        })
    }

    #[instrument(name = "fetch_unit_price", skip(self))]
    pub async fn fetch_unit_price(&self, chain_id: &str, address: &str) -> Result<PriceQuote, Error> {
        log_if_error!(match self {
            #[cfg(feature = "testing")]
            Self::Mock(oracle) => oracle.fetch_unit_price(chain_id, address).await,

            Self::Funkit(oracle) => oracle.fetch_unit_price(chain_id, address).await,
        })
    }

    /// Looks up every key concurrently. Results come back in the order of `keys`.
    pub async fn fetch_many_token_metadata(&self, keys: &[MetadataKey]) -> Result<Vec<Result<TokenMetadata, Error>>, Error> {
        let mut executor = ConcurrentExecutor::new(self.clone(), BATCH_WORKERS);
        for key in keys.iter().cloned() {
            executor.register(task!(|client| { client.fetch_token_metadata(&key.chain_id, &key.symbol).await }));
        }

        executor.execute().await.map_err(|e| Error::Unknown(e.to_string()))
    }

    /// Looks up every key concurrently. Results come back in the order of `keys`.
    pub async fn fetch_many_unit_prices(&self, keys: &[PriceKey]) -> Result<Vec<Result<PriceQuote, Error>>, Error> {
        let mut executor = ConcurrentExecutor::new(self.clone(), BATCH_WORKERS);
        for key in keys.iter().cloned() {
            executor.register(task!(|client| { client.fetch_unit_price(&key.chain_id, &key.address).await }));
        }

        executor.execute().await.map_err(|e| Error::Unknown(e.to_string()))
    }
}

#[async_trait]
impl PriceOracle for Client {
    async fn fetch_token_metadata(&self, chain_id: &str, symbol: &str) -> Result<TokenMetadata, Error> {
        Client::fetch_token_metadata(self, chain_id, symbol).await
    }

    async fn fetch_unit_price(&self, chain_id: &str, address: &str) -> Result<PriceQuote, Error> {
        Client::fetch_unit_price(self, chain_id, address).await
    }
}
