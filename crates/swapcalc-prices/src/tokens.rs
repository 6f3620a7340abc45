use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MetadataKey, PriceKey, TokenMetadata};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chain {
    pub id: &'static str,
    pub name: &'static str,
    pub short_name: &'static str,
}

pub const CHAINS: &[Chain] = &[
    Chain {
        id: "1",
        name: "Ethereum",
        short_name: "ETH",
    },
    Chain {
        id: "137",
        name: "Polygon",
        short_name: "POL",
    },
    Chain {
        id: "8453",
        name: "Base",
        short_name: "BASE",
    },
];

struct CatalogEntry {
    symbol: &'static str,
    chain_id: &'static str,
    name: &'static str,
    decimals: u8,
    icon: &'static str,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        symbol: "USDC",
        chain_id: "1",
        name: "USD Coin",
        decimals: 6,
        icon: "usdc.svg",
    },
    CatalogEntry {
        symbol: "USDT",
        chain_id: "137",
        name: "Tether USD",
        decimals: 6,
        icon: "usdt.svg",
    },
    CatalogEntry {
        symbol: "ETH",
        chain_id: "8453",
        name: "Ethereum",
        decimals: 18,
        icon: "eth.svg",
    },
    CatalogEntry {
        symbol: "WBTC",
        chain_id: "1",
        name: "Wrapped Bitcoin",
        decimals: 8,
        icon: "btc.svg",
    },
    CatalogEntry {
        symbol: "MATIC",
        chain_id: "137",
        name: "Polygon",
        decimals: 18,
        icon: "matic.svg",
    },
    CatalogEntry {
        symbol: "UNI",
        chain_id: "1",
        name: "Uniswap",
        decimals: 18,
        icon: "uni.svg",
    },
    CatalogEntry {
        symbol: "LINK",
        chain_id: "1",
        name: "Chainlink",
        decimals: 18,
        icon: "link.svg",
    },
    CatalogEntry {
        symbol: "AAVE",
        chain_id: "1",
        name: "Aave",
        decimals: 18,
        icon: "aave.svg",
    },
];

/// A selectable token. The address starts empty and is filled in from
/// the metadata lookup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub chain_id: String,
    pub address: String,
    pub name: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl From<&CatalogEntry> for Token {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            symbol: entry.symbol.to_string(),
            chain_id: entry.chain_id.to_string(),
            address: String::new(),
            name: entry.name.to_string(),
            decimals: entry.decimals,
            icon: Some(format!("/assets/{}", entry.icon)),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chain_info(&self.chain_id) {
            Some(chain) => write!(f, "{} ({})", self.symbol, chain.name),
            None => write!(f, "{} ({})", self.symbol, self.chain_id),
        }
    }
}

impl Token {
    /// Two tokens are the same when symbol and chain match, whatever their address.
    pub fn is_same(&self, other: &Token) -> bool {
        self.symbol == other.symbol && self.chain_id == other.chain_id
    }

    pub fn has_address(&self) -> bool {
        !self.address.is_empty()
    }

    pub fn metadata_key(&self) -> MetadataKey {
        MetadataKey {
            chain_id: self.chain_id.clone(),
            symbol: self.symbol.clone(),
        }
    }

    /// `None` until the address has been resolved.
    pub fn price_key(&self) -> Option<PriceKey> {
        self.has_address().then(|| PriceKey {
            chain_id: self.chain_id.clone(),
            address: self.address.clone(),
        })
    }

    /// Applies a metadata lookup. Only the address and the decimals are taken from it,
    /// the catalog stays authoritative for the display name.
    pub fn with_metadata(mut self, metadata: &TokenMetadata) -> Self {
        self.address = metadata.address.clone();
        self.decimals = metadata.decimals;
        self
    }
}

pub fn supported_tokens() -> Vec<Token> {
    CATALOG.iter().map(Token::from).collect()
}

pub fn find_token(symbol: &str, chain_id: &str) -> Option<Token> {
    CATALOG
        .iter()
        .find(|x| x.symbol.eq_ignore_ascii_case(symbol) && x.chain_id == chain_id)
        .map(Token::from)
}

/// Finds a token by symbol alone, chain ids being optional on the command line.
/// Returns the first catalog entry carrying the symbol.
pub fn find_token_by_symbol(symbol: &str) -> Option<Token> {
    CATALOG.iter().find(|x| x.symbol.eq_ignore_ascii_case(symbol)).map(Token::from)
}

pub fn chain_info(chain_id: &str) -> Option<&'static Chain> {
    CHAINS.iter().find(|x| x.id == chain_id)
}

/// Tokens that can be picked for one side when `exclude` is held by the other.
pub fn selectable_tokens(exclude: Option<&Token>) -> Vec<Token> {
    supported_tokens()
        .into_iter()
        .filter(|x| exclude.map_or(true, |other| !x.is_same(other)))
        .collect()
}
