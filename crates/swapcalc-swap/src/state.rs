use std::fmt;

use swapcalc_prices::math::{amounts_from_token_amount, amounts_from_usd, exchange_rate, Amounts};
use swapcalc_prices::tokens::Token;
use swapcalc_prices::{Error, MetadataKey, PriceKey, PriceQuote, TokenMetadata};

use crate::validation::AmountError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Source, Side::Target];

    pub fn other(self) -> Self {
        match self {
            Self::Source => Self::Target,
            Self::Target => Self::Source,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// One of the four editable amounts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    SourceAmount,
    SourceUsd,
    TargetAmount,
    TargetUsd,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::SourceAmount, Field::SourceUsd, Field::TargetAmount, Field::TargetUsd];

    pub fn new(side: Side, usd: bool) -> Self {
        match (side, usd) {
            (Side::Source, false) => Self::SourceAmount,
            (Side::Source, true) => Self::SourceUsd,
            (Side::Target, false) => Self::TargetAmount,
            (Side::Target, true) => Self::TargetUsd,
        }
    }

    pub fn side(self) -> Side {
        match self {
            Self::SourceAmount | Self::SourceUsd => Side::Source,
            Self::TargetAmount | Self::TargetUsd => Side::Target,
        }
    }

    pub fn is_usd(self) -> bool {
        matches!(self, Self::SourceUsd | Self::TargetUsd)
    }

    /// The same kind of field on the other side.
    pub fn mirrored(self) -> Self {
        Self::new(self.side().other(), self.is_usd())
    }
}

/// Progress of one lookup as seen by the state.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(Error),
}

impl<T> Default for Lookup<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> Lookup<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ready(x) => Some(x),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SidePanel {
    pub token: Option<Token>,
    pub amount: String,
    pub usd: String,
    pub metadata: Lookup<TokenMetadata>,
    pub price: Lookup<PriceQuote>,
}

impl SidePanel {
    pub fn unit_price(&self) -> Option<f64> {
        self.price.value().map(|x| x.unit_price)
    }

    pub fn metadata_key(&self) -> Option<MetadataKey> {
        self.token.as_ref().map(Token::metadata_key)
    }

    pub fn price_key(&self) -> Option<PriceKey> {
        self.token.as_ref().and_then(Token::price_key)
    }

    pub fn decimals(&self) -> u8 {
        self.token.as_ref().map_or(18, |x| x.decimals)
    }

    /// The first error worth showing for this side. Metadata errors win over price errors.
    pub fn error(&self) -> Option<&Error> {
        self.metadata.error().or_else(|| self.price.error())
    }

    /// A token waits for its address only while its metadata lookup has not completed.
    fn awaits_address(&self) -> bool {
        self.token.as_ref().is_some_and(|x| !x.has_address()) && matches!(self.metadata, Lookup::Idle | Lookup::Loading)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Prices {
    pub source: Option<f64>,
    pub target: Option<f64>,
}

/// Every amount of a trade, both sides carrying the same USD value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedAmounts {
    pub source_amount: f64,
    pub source_usd: f64,
    pub target_amount: f64,
    pub target_usd: f64,
}

impl DerivedAmounts {
    fn new(side: Side, amounts: Amounts) -> Self {
        match side {
            Side::Source => Self {
                source_amount: amounts.token_amount,
                source_usd: amounts.usd_amount,
                target_amount: amounts.counter_token_amount,
                target_usd: amounts.counter_usd_amount,
            },
            Side::Target => Self {
                source_amount: amounts.counter_token_amount,
                source_usd: amounts.counter_usd_amount,
                target_amount: amounts.token_amount,
                target_usd: amounts.usd_amount,
            },
        }
    }

    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::SourceAmount => self.source_amount,
            Field::SourceUsd => self.source_usd,
            Field::TargetAmount => self.target_amount,
            Field::TargetUsd => self.target_usd,
        }
    }
}

/// Computes the four amounts from the value typed in `field`. `None` when a price is
/// missing or the value is not positive.
pub fn derive_amounts(field: Field, value: f64, prices: Prices) -> Option<DerivedAmounts> {
    let side = field.side();
    let (price, counter_price) = match side {
        Side::Source => (prices.source, prices.target),
        Side::Target => (prices.target, prices.source),
    };

    let amounts = if field.is_usd() {
        amounts_from_usd(value, price, counter_price)?
    } else {
        amounts_from_token_amount(value, price, counter_price)?
    };

    Some(DerivedAmounts::new(side, amounts))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SwapState {
    pub source: SidePanel,
    pub target: SidePanel,
    pub last_edited: Option<Field>,
    pub input_error: Option<AmountError>,
}

impl SwapState {
    pub fn panel(&self, side: Side) -> &SidePanel {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub fn panel_mut(&mut self, side: Side) -> &mut SidePanel {
        match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        }
    }

    pub fn field(&self, field: Field) -> &str {
        let panel = self.panel(field.side());
        if field.is_usd() {
            &panel.usd
        } else {
            &panel.amount
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut String {
        let panel = self.panel_mut(field.side());
        if field.is_usd() {
            &mut panel.usd
        } else {
            &mut panel.amount
        }
    }

    pub fn prices(&self) -> Prices {
        Prices {
            source: self.source.unit_price(),
            target: self.target.unit_price(),
        }
    }

    /// True while a metadata lookup runs or a selected token still waits for its address.
    pub fn is_loading(&self) -> bool {
        Side::ALL.iter().any(|x| {
            let panel = self.panel(*x);
            panel.metadata.is_loading() || panel.awaits_address()
        })
    }

    pub fn side_error(&self, side: Side) -> Option<&Error> {
        self.panel(side).error()
    }

    pub fn can_retry(&self, side: Side) -> bool {
        self.side_error(side).is_some_and(|x| x.kind().is_retryable())
    }

    /// Units of the target token for one source token.
    pub fn rate(&self) -> Option<f64> {
        let prices = self.prices();
        exchange_rate(prices.source, prices.target)
    }
}
