//! Pure transitions of the swap state. Every transition returns the lookups the caller
//! has to run, their results coming back as resolution events.

use swapcalc_prices::tokens::Token;
use swapcalc_prices::{Error, MetadataKey, PriceKey, PriceQuote, TokenMetadata};
use tracing::{debug, warn};

use crate::format::{format_input_amount, format_usd_input, parse_numeric_input};
use crate::state::{derive_amounts, Field, Lookup, Side, SwapState};
use crate::validation::validate_amount;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Query {
    Metadata,
    Price,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Edit { field: Field, raw: String },
    SelectToken { side: Side, token: Token },
    Flip,
    Retry { side: Side, query: Query },
    Clear,

    MetadataResolved { key: MetadataKey, result: Result<TokenMetadata, Error> },
    PriceResolved { key: PriceKey, result: Result<PriceQuote, Error> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    FetchMetadata(MetadataKey),
    FetchPrice(PriceKey),
    InvalidateMetadata(MetadataKey),
    InvalidatePrice(PriceKey),
    /// Keeps the price of `key` refreshed for `side`, replacing any previous subscription of that side.
    Subscribe { side: Side, key: PriceKey },
    Unsubscribe { side: Side },
}

pub fn reduce(state: &mut SwapState, event: Event) -> Vec<Effect> {
    match event {
        Event::Edit { field, raw } => {
            edit(state, field, raw);
            vec![]
        },
        Event::SelectToken { side, token } => select_token(state, side, token),
        Event::Flip => flip(state),
        Event::Retry { side, query } => retry(state, side, query),
        Event::Clear => {
            clear(state);
            vec![]
        },
        Event::MetadataResolved { key, result } => metadata_resolved(state, key, result),
        Event::PriceResolved { key, result } => {
            price_resolved(state, key, result);
            vec![]
        },
    }
}

fn edit(state: &mut SwapState, field: Field, raw: String) {
    state.last_edited = Some(field);
    *state.field_mut(field) = parse_numeric_input(&raw);

    recompute(state);
}

/// Rewrites the fields derived from the last edited one, or clears them when nothing can
/// be derived.
fn recompute(state: &mut SwapState) {
    let Some(driver) = state.last_edited else {
        return;
    };

    let derived = match validate_amount(state.field(driver)) {
        Ok(value) => {
            state.input_error = None;
            derive_amounts(driver, value, state.prices())
        },
        Err(e) => {
            state.input_error = Some(e);
            None
        },
    };

    for field in Field::ALL.into_iter().filter(|x| *x != driver) {
        let decimals = state.panel(field.side()).decimals();
        *state.field_mut(field) = match derived {
            Some(amounts) if field.is_usd() => format_usd_input(amounts.get(field)),
            Some(amounts) => format_input_amount(amounts.get(field), decimals),
            None => String::new(),
        };
    }
}

fn select_token(state: &mut SwapState, side: Side, token: Token) -> Vec<Effect> {
    if state.panel(side.other()).token.as_ref().is_some_and(|x| x.is_same(&token)) {
        debug!(%side, symbol = %token.symbol, "token already selected on the other side");
        return vec![];
    }

    let panel = state.panel_mut(side);
    if panel.token.as_ref().is_some_and(|x| x.is_same(&token)) {
        return vec![];
    }

    let mut effects = vec![];
    if panel.price_key().is_some() {
        effects.push(Effect::Unsubscribe { side });
    }

    let token = Token {
        address: String::new(),
        ..token
    };

    effects.push(Effect::FetchMetadata(token.metadata_key()));

    panel.token = Some(token);
    panel.metadata = Lookup::Loading;
    panel.price = Lookup::Idle;

    recompute(state);
    effects
}

fn flip(state: &mut SwapState) -> Vec<Effect> {
    std::mem::swap(&mut state.source, &mut state.target);
    state.last_edited = state.last_edited.map(Field::mirrored);

    let mut effects = vec![];
    for side in Side::ALL {
        match state.panel(side).price_key() {
            Some(key) => effects.extend([
                Effect::InvalidatePrice(key.clone()),
                Effect::FetchPrice(key.clone()),
                Effect::Subscribe { side, key },
            ]),
            None => effects.push(Effect::Unsubscribe { side }),
        }
    }

    effects
}

fn retry(state: &mut SwapState, side: Side, query: Query) -> Vec<Effect> {
    let panel = state.panel_mut(side);

    match query {
        Query::Metadata => {
            let Some(key) = panel.metadata_key() else {
                return vec![];
            };

            panel.metadata = Lookup::Loading;
            vec![Effect::InvalidateMetadata(key.clone()), Effect::FetchMetadata(key)]
        },
        Query::Price => {
            let Some(key) = panel.price_key() else {
                return vec![];
            };

            if panel.price.value().is_none() {
                panel.price = Lookup::Loading;
            }

            vec![Effect::InvalidatePrice(key.clone()), Effect::FetchPrice(key)]
        },
    }
}

/// Empties every amount. The remaining fields would only be derived from the cleared ones.
fn clear(state: &mut SwapState) {
    debug!("clearing amounts");

    for field in Field::ALL {
        state.field_mut(field).clear();
    }

    state.last_edited = None;
    state.input_error = None;
}

fn tracking_metadata(state: &SwapState, key: &MetadataKey) -> Option<Side> {
    Side::ALL.into_iter().find(|x| state.panel(*x).metadata_key().as_ref() == Some(key))
}

fn tracking_price(state: &SwapState, key: &PriceKey) -> Option<Side> {
    Side::ALL.into_iter().find(|x| state.panel(*x).price_key().as_ref() == Some(key))
}

fn metadata_resolved(state: &mut SwapState, key: MetadataKey, result: Result<TokenMetadata, Error>) -> Vec<Effect> {
    let Some(side) = tracking_metadata(state, &key) else {
        warn!(%key, "discarding metadata of a token no longer selected");
        return vec![];
    };

    let panel = state.panel_mut(side);
    let previous = panel.price_key();
    let mut effects = vec![];

    match result {
        Ok(metadata) => {
            panel.token = panel.token.take().map(|x| x.with_metadata(&metadata));
            panel.metadata = Lookup::Ready(metadata);

            match panel.price_key() {
                Some(key) if previous.as_ref() != Some(&key) => {
                    panel.price = Lookup::Loading;
                    effects.extend([Effect::FetchPrice(key.clone()), Effect::Subscribe { side, key }]);
                },
                Some(_) => {},
                None => {
                    panel.price = Lookup::Failed(Error::MissingAddress);
                    if previous.is_some() {
                        effects.push(Effect::Unsubscribe { side });
                    }
                },
            }
        },
        Err(e) => {
            panel.metadata = Lookup::Failed(e);
            if previous.is_none() {
                panel.price = Lookup::Idle;
            }
        },
    }

    recompute(state);
    effects
}

fn price_resolved(state: &mut SwapState, key: PriceKey, result: Result<PriceQuote, Error>) {
    let Some(side) = tracking_price(state, &key) else {
        warn!(%key, "discarding price of a token no longer selected");
        return;
    };

    let panel = state.panel_mut(side);
    match result {
        Ok(quote) => panel.price = Lookup::Ready(quote),
        Err(e) if panel.price.value().is_some() => {
            warn!(%key, error = %e, "price refresh failed, keeping last price");
        },
        Err(e) => panel.price = Lookup::Failed(e),
    }

    recompute(state);
}
