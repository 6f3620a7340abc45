use clap::Args;
use swapcalc_prices::tokens::{selectable_tokens, Token};
use swapcalc_prices::{Client, Error as PriceError, PriceQuote};
use swapcalc_swap::format::format_usd;
use tracing::info;

use crate::core::context::Context;
use crate::core::Error;
use crate::validation::{resolve_chain_id, resolve_token};

#[derive(Args, Clone)]
pub struct TokensCommandParameters {
    #[clap(long, help = "Only list tokens of this chain (id or name)")]
    pub chain: Option<String>,

    #[clap(long, help = "Only list tokens that can be swapped against this one (SYMBOL or SYMBOL:CHAIN)")]
    pub against: Option<String>,

    #[clap(long, help = "Look up the current USD price of every token")]
    pub prices: bool,
}

pub struct TokenRow {
    pub token: Token,
    pub price: Option<Result<PriceQuote, PriceError>>,
}

pub fn list_tokens(chain: Option<&str>, against: Option<&str>) -> Result<Vec<Token>, Error> {
    let chain_id = chain.map(resolve_chain_id).transpose()?;
    let against = against.map(resolve_token).transpose()?;

    Ok(selectable_tokens(against.as_ref())
        .into_iter()
        .filter(|x| chain_id.as_ref().map_or(true, |id| &x.chain_id == id))
        .collect())
}

/// Resolves the address of every token, then prices the ones that have one.
pub async fn price_tokens(client: &Client, tokens: Vec<Token>) -> Result<Vec<TokenRow>, Error> {
    let metadata_keys: Vec<_> = tokens.iter().map(Token::metadata_key).collect();
    let metadata = client
        .fetch_many_token_metadata(&metadata_keys)
        .await
        .map_err(|e| Error::Execution(e.to_string()))?;

    let mut resolved = vec![];
    for (token, metadata) in tokens.into_iter().zip(metadata) {
        match metadata {
            Ok(metadata) => resolved.push((token.with_metadata(&metadata), None)),
            Err(e) => resolved.push((token, Some(e))),
        }
    }

    let price_keys: Vec<_> = resolved.iter().filter_map(|(token, _)| token.price_key()).collect();
    let mut prices = client
        .fetch_many_unit_prices(&price_keys)
        .await
        .map_err(|e| Error::Execution(e.to_string()))?
        .into_iter();

    let rows = resolved
        .into_iter()
        .map(|(token, error)| {
            let price = match error {
                Some(e) => Some(Err(e)),
                None if token.has_address() => prices.next(),
                None => Some(Err(PriceError::MissingAddress)),
            };

            TokenRow { token, price }
        })
        .collect();

    Ok(rows)
}

// Display the catalog in a table
//
// Example:
// ______________________________________________________________
// | Symbol   | Chain      | Name                 | Price (USD)  |
// |----------|------------|----------------------|--------------|
// | USDC     | Ethereum   | USD Coin             | $1.00        |
// ______________________________________________________________
//
fn display_table(rows: &[TokenRow]) {
    println!("\n{}", "_".repeat(62));
    println!("| {:<8} | {:<10} | {:<20} | {:<12} |", "Symbol", "Chain", "Name", "Price (USD)");
    println!("|{}|{}|{}|{}|", "-".repeat(10), "-".repeat(12), "-".repeat(22), "-".repeat(14));

    for row in rows {
        let chain = swapcalc_prices::tokens::chain_info(&row.token.chain_id).map_or(row.token.chain_id.as_str(), |x| x.name);
        let price = match &row.price {
            None => "-".to_string(),
            Some(Ok(quote)) => format_usd(quote.unit_price),
            Some(Err(e)) => e.user_message().to_string(),
        };

        println!("| {:<8} | {:<10} | {:<20} | {:<12} |", row.token.symbol, chain, row.token.name, price);
    }
    println!("{}", "_".repeat(62));
}

pub async fn command_tokens(context: &Context, params: TokensCommandParameters) -> Result<(), Error> {
    let tokens = list_tokens(params.chain.as_deref(), params.against.as_deref())?;

    let rows = if params.prices {
        info!("📈 Fetching prices of {} tokens", tokens.len());
        price_tokens(&context.price_client()?, tokens).await?
    } else {
        tokens.into_iter().map(|token| TokenRow { token, price: None }).collect()
    };

    display_table(&rows);

    Ok(())
}
