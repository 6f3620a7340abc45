use std::time::Duration;

use reqwest::{Client as HTTPClient, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::{Error, PriceQuote, TokenMetadata};

pub const DEFAULT_FUNKIT_ENDPOINT: &str = "https://api.fun.xyz/v1";

const API_KEY_HEADER: &str = "X-Api-Key";
const DEFAULT_DECIMALS: u8 = 18;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FunkitConfiguration {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for FunkitConfiguration {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_FUNKIT_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

#[derive(Deserialize, Debug)]
struct MetadataResponse {
    symbol: Option<String>,
    chain: Option<String>,
    address: Option<String>,
    name: Option<String>,
    decimals: Option<u8>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum UnitPrice {
    Number(f64),
    Text(String),
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum PriceResponse {
    Quote {
        #[serde(rename = "unitPrice")]
        unit_price: Option<UnitPrice>,
    },
    Bare(UnitPrice),
}

/// Client of the funkit asset API.
#[derive(Clone)]
pub struct FunkitPriceOracle {
    endpoint: String,
    api_key: Option<String>,
    client: HTTPClient,
}

impl FunkitPriceOracle {
    pub fn new(configuration: &FunkitConfiguration) -> Result<Self, Error> {
        let client = HTTPClient::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Unknown(format!("invalid http client {}", e)))?;

        Ok(Self {
            endpoint: configuration.endpoint.clone(),
            api_key: configuration.api_key.clone().filter(|x| !x.is_empty()),
            client,
        })
    }

    pub async fn fetch_token_metadata(&self, chain_id: &str, symbol: &str) -> Result<TokenMetadata, Error> {
        let api_key = self.api_key()?;
        let not_found = || Error::TokenNotFound {
            chain_id: chain_id.to_string(),
            symbol: symbol.to_string(),
        };

        let url = self.url(&["asset", "erc20", chain_id, symbol])?;
        let Some(body) = self.get(url, api_key).await? else {
            return Err(not_found());
        };

        let response = serde_json::from_str::<Option<MetadataResponse>>(&body)
            .map_err(|e| Error::Unknown(format!("wrong format {}", e)))?
            .ok_or_else(not_found)?;

        Ok(TokenMetadata {
            symbol: response.symbol.unwrap_or_else(|| symbol.to_string()),
            chain_id: response.chain.unwrap_or_else(|| chain_id.to_string()),
            address: response.address.unwrap_or_default(),
            name: response.name.unwrap_or_else(|| symbol.to_string()),
            decimals: response.decimals.unwrap_or(DEFAULT_DECIMALS),
        })
    }

    pub async fn fetch_unit_price(&self, chain_id: &str, address: &str) -> Result<PriceQuote, Error> {
        let api_key = self.api_key()?;
        if address.is_empty() {
            return Err(Error::MissingAddress);
        }

        let not_found = || Error::PriceNotFound {
            chain_id: chain_id.to_string(),
            address: address.to_string(),
        };

        let url = self.url(&["asset", "erc20", "price", chain_id, address])?;
        let Some(body) = self.get(url, api_key).await? else {
            return Err(not_found());
        };

        let response = serde_json::from_str::<Option<PriceResponse>>(&body).map_err(|_| Error::InvalidPrice(body.clone()))?;

        let unit_price = match response {
            None | Some(PriceResponse::Quote { unit_price: None }) => return Err(not_found()),
            Some(PriceResponse::Quote { unit_price: Some(x) }) | Some(PriceResponse::Bare(x)) => x,
        };

        let unit_price = match unit_price {
            UnitPrice::Number(x) => x,
            UnitPrice::Text(x) => x.trim().parse::<f64>().map_err(|_| Error::InvalidPrice(x.clone()))?,
        };

        PriceQuote::new(unit_price)
    }

    fn api_key(&self) -> Result<&str, Error> {
        self.api_key.as_deref().ok_or(Error::Config)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| Error::Unknown(format!("invalid url {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| Error::Unknown(format!("invalid url {}", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Returns the body of a successful response, `None` when the resource does not exist.
    async fn get(&self, url: Url, api_key: &str) -> Result<Option<String>, Error> {
        let response = self.client.get(url).header(API_KEY_HEADER, api_key).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(Error::from_response(status, &text));
        }

        match text.trim() {
            "" | "null" => Ok(None),
            _ => Ok(Some(text)),
        }
    }
}
