use std::sync::Arc;

use clap::Args;
use swapcalc_common::cache::SystemClock;
use swapcalc_prices::PriceOracle;
use swapcalc_swap::format::{display_usd_amount, format_token_amount};
use swapcalc_swap::validation::parse_amount;
use swapcalc_swap::{Event, Field, Side, SwapSession, SwapState};
use tracing::info;

use crate::core::context::Context;
use crate::core::Error;
use crate::validation::{assert_amount, assert_distinct_tokens, resolve_token};

/// Exactly one amount drives the quote.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
pub struct AmountParameters {
    #[clap(long, help = "Amount of the source token to sell")]
    pub amount: Option<String>,

    #[clap(long, help = "USD value to sell")]
    pub usd: Option<String>,

    #[clap(long, help = "Amount of the target token to receive")]
    pub to_amount: Option<String>,

    #[clap(long, help = "USD value to receive")]
    pub to_usd: Option<String>,
}

impl AmountParameters {
    pub fn field(&self) -> Option<(Field, &str)> {
        let fields = [
            (Field::SourceAmount, &self.amount),
            (Field::SourceUsd, &self.usd),
            (Field::TargetAmount, &self.to_amount),
            (Field::TargetUsd, &self.to_usd),
        ];

        fields.into_iter().find_map(|(field, value)| value.as_deref().map(|x| (field, x)))
    }
}

#[derive(Args, Clone, Debug)]
pub struct QuoteCommandParameters {
    #[clap(long, help = "Token to sell, as SYMBOL or SYMBOL:CHAIN")]
    pub from: String,

    #[clap(long, help = "Token to receive, as SYMBOL or SYMBOL:CHAIN")]
    pub to: String,

    #[command(flatten)]
    pub amounts: AmountParameters,
}

/// Selects both tokens, applies the amount and waits for every lookup to complete.
pub async fn prepare_session(oracle: Arc<dyn PriceOracle>, params: &QuoteCommandParameters) -> Result<SwapSession, Error> {
    let source = resolve_token(&params.from)?;
    let target = resolve_token(&params.to)?;
    assert_distinct_tokens(&source, &target)?;

    let (field, raw) = params
        .amounts
        .field()
        .ok_or(Error::Validation("an amount is required".to_string()))?;
    assert_amount(raw)?;

    info!("🔎 Quoting {} for {}", source, target);

    let mut session = SwapSession::new(oracle, SystemClock::shared());
    session.dispatch(Event::SelectToken {
        side: Side::Source,
        token: source,
    });
    session.dispatch(Event::SelectToken {
        side: Side::Target,
        token: target,
    });
    session.dispatch(Event::Edit {
        field,
        raw: raw.to_string(),
    });
    session.settle().await;

    Ok(session)
}

/// Fails with the message of the first side that could not be priced.
pub fn assert_quoted(state: &SwapState) -> Result<(), Error> {
    for side in Side::ALL {
        if let Some(e) = state.side_error(side) {
            let hint = if state.can_retry(side) { " (temporary, try again)" } else { "" };
            return Err(Error::Execution(format!("{} token: {}{}", side, e.user_message(), hint)));
        }
    }

    Ok(())
}

pub fn render_quote(state: &SwapState) -> String {
    let mut lines = vec![];
    for side in Side::ALL {
        let panel = state.panel(side);
        let Some(token) = &panel.token else { continue };

        let amount = parse_amount(&panel.amount).map_or("-".to_string(), |x| format_token_amount(x, panel.decimals()));
        let usd = match display_usd_amount(&panel.usd) {
            x if x.is_empty() => "-".to_string(),
            x => format!("${}", x),
        };

        lines.push(format!("{:<6} {:<20} {:>18} {:>12}", side, token.to_string(), amount, usd));
    }

    if let (Some(rate), Some(source), Some(target)) = (state.rate(), &state.source.token, &state.target.token) {
        lines.push(format!("rate   1 {} = {:.6} {}", source.symbol, rate, target.symbol));
    }

    lines.join("\n")
}

pub async fn command_quote(context: &Context, params: QuoteCommandParameters) -> Result<(), Error> {
    let oracle: Arc<dyn PriceOracle> = Arc::new(context.price_client()?);
    let session = prepare_session(oracle, &params).await?;

    assert_quoted(session.state())?;
    println!("{}", render_quote(session.state()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use swapcalc_prices::mock::StaticPriceOracle;
    use swapcalc_prices::{Client, Error as PriceError, TokenMetadata};

    use super::*;

    fn metadata(symbol: &str, chain_id: &str, address: &str, decimals: u8) -> TokenMetadata {
        TokenMetadata {
            symbol: symbol.to_string(),
            chain_id: chain_id.to_string(),
            address: address.to_string(),
            name: symbol.to_string(),
            decimals,
        }
    }

    fn oracle() -> StaticPriceOracle {
        StaticPriceOracle::default()
            .with_latency(Duration::from_millis(50))
            .with_metadata(metadata("USDC", "1", "0xa0b8", 6))
            .with_metadata(metadata("WBTC", "1", "0x2260", 8))
            .with_price("1", "0xa0b8", 1.0)
            .with_price("1", "0x2260", 50000.0)
    }

    fn params(from: &str, to: &str, amounts: AmountParameters) -> QuoteCommandParameters {
        QuoteCommandParameters {
            from: from.to_string(),
            to: to.to_string(),
            amounts,
        }
    }

    fn usd(value: &str) -> AmountParameters {
        AmountParameters {
            amount: None,
            usd: Some(value.to_string()),
            to_amount: None,
            to_usd: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn quote_derives_every_amount() {
        // Given
        let client = Client::from_mock(Arc::new(oracle()));

        // When
        let session = prepare_session(Arc::new(client), &params("USDC", "WBTC", usd("1000"))).await.unwrap();

        // Then
        let state = session.state();
        assert!(assert_quoted(state).is_ok());
        assert_eq!(state.source.amount, "1000");
        assert_eq!(state.target.amount, "0.02");
        assert_eq!(state.target.usd, "1000.00");

        let rendered = render_quote(state);
        assert!(rendered.contains("$1000.00"));
        assert!(rendered.contains("rate   1 USDC = 0.000020 WBTC"));
    }

    #[tokio::test(start_paused = true)]
    async fn unpriced_token_fails_the_quote() {
        // Given
        let oracle = oracle();
        oracle.set_price_error("1", "0x2260", PriceError::Config);
        let client = Client::from_mock(Arc::new(oracle));

        // When
        let session = prepare_session(Arc::new(client), &params("USDC", "WBTC", usd("10"))).await.unwrap();

        // Then
        let result = assert_quoted(session.state());
        assert!(matches!(result, Err(Error::Execution(ref x)) if x.starts_with("target token")));
    }

    #[tokio::test]
    async fn arguments_are_validated_before_lookups() {
        let client: Arc<dyn PriceOracle> = Arc::new(Client::from_mock(Arc::new(oracle())));

        let same = prepare_session(client.clone(), &params("USDC", "usdc", usd("10"))).await;
        assert!(matches!(same, Err(Error::Validation(_))));

        let negative = prepare_session(client, &params("USDC", "WBTC", usd("-10"))).await;
        assert!(matches!(negative, Err(Error::Validation(_))));
    }
}
