use reqwest::StatusCode;
use swapcalc_common::query::Retryable;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("API key not configured")]
    Config,

    #[error("token address is required")]
    MissingAddress,

    #[error("token {symbol} not found on chain {chain_id}")]
    TokenNotFound { chain_id: String, symbol: String },

    #[error("price not found for token {address} on chain {chain_id}")]
    PriceNotFound { chain_id: String, address: String },

    #[error("invalid price data received: {0}")]
    InvalidPrice(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("failed to fetch: {0}")]
    Transport(String),

    #[error("{0}")]
    Unknown(String),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(StatusCode::TOO_MANY_REQUESTS) => Self::RateLimited(value.to_string()),
            _ => Self::Transport(value.to_string()),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config => ErrorKind::Config,
            Self::MissingAddress => ErrorKind::MissingAddress,
            Self::TokenNotFound { .. } => ErrorKind::TokenNotFound,
            Self::PriceNotFound { .. } => ErrorKind::PriceNotFound,
            Self::InvalidPrice(_) => ErrorKind::InvalidPrice,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Builds the error for a non successful upstream response.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = format!("status={} body={}", status, body);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Self::RateLimited(message);
        }

        match ErrorKind::categorize(body) {
            ErrorKind::Config => Self::Config,
            ErrorKind::RateLimited => Self::RateLimited(message),
            ErrorKind::Transport => Self::Transport(message),
            _ if status.is_server_error() => Self::Transport(message),
            _ => Self::Unknown(message),
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Coarse classification of lookup failures, as presented to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    MissingAddress,
    TokenNotFound,
    PriceNotFound,
    InvalidPrice,
    RateLimited,
    Transport,
    Unknown,
}

impl ErrorKind {
    /// Classifies a free-form error message by the keywords it contains.
    pub fn categorize(message: &str) -> Self {
        let message = message.to_lowercase();
        let contains_any = |needles: &[&str]| needles.iter().any(|x| message.contains(x));

        if message.is_empty() {
            return Self::Unknown;
        }

        if contains_any(&["api key", "api_key"]) {
            return Self::Config;
        }

        if contains_any(&["network", "fetch", "connection", "timeout"]) {
            return Self::Transport;
        }

        // Price first: price messages usually mention the token they are about.
        if message.contains("price") && message.contains("not found") {
            return Self::PriceNotFound;
        }

        if message.contains("token") && message.contains("not found") {
            return Self::TokenNotFound;
        }

        if contains_any(&["rate limit", "too many requests", "429"]) {
            return Self::RateLimited;
        }

        if message.contains("invalid") {
            return Self::InvalidPrice;
        }

        Self::Unknown
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::PriceNotFound | Self::RateLimited | Self::Unknown)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Config => "API configuration is missing. Please check your settings.",
            Self::Transport => "Unable to connect to the service. Please check your internet connection and try again.",
            Self::MissingAddress | Self::TokenNotFound => "Token information could not be found. Please try selecting a different token.",
            Self::PriceNotFound => "Price data is currently unavailable. Please try again in a moment.",
            Self::InvalidPrice => "Received invalid data. Please try again.",
            Self::RateLimited => "Too many requests. Please wait a moment and try again.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}
