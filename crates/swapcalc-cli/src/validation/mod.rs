use swapcalc_prices::tokens::{find_token, find_token_by_symbol, Token, CHAINS};
use swapcalc_swap::validation::validate_amount;

use crate::core::Error;

/// Resolves a chain given by id, name or short name.
pub fn resolve_chain_id(value: &str) -> Result<String, Error> {
    CHAINS
        .iter()
        .find(|x| x.id == value || x.name.eq_ignore_ascii_case(value) || x.short_name.eq_ignore_ascii_case(value))
        .map(|x| x.id.to_string())
        .ok_or(Error::Validation(format!("unsupported chain {}", value)))
}

/// Resolves a `SYMBOL[:CHAIN]` argument against the token catalog.
pub fn resolve_token(value: &str) -> Result<Token, Error> {
    let token = match value.split_once(':') {
        Some((symbol, chain)) => find_token(symbol.trim(), &resolve_chain_id(chain.trim())?),
        None => find_token_by_symbol(value.trim()),
    };

    token.ok_or(Error::Validation(format!("unsupported token {}", value)))
}

pub fn assert_distinct_tokens(source: &Token, target: &Token) -> Result<(), Error> {
    if source.is_same(target) {
        return Err(Error::Validation(format!("cannot swap {} for itself", source)));
    }

    Ok(())
}

pub fn assert_amount(raw: &str) -> Result<(), Error> {
    validate_amount(raw).map(|_| ()).map_err(|e| Error::Validation(e.to_string()))
}
