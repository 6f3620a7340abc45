use std::sync::Arc;

use clap::Args;
use swapcalc_prices::PriceOracle;
use swapcalc_swap::SwapSession;
use tracing::{info, warn};

use crate::command::quote::{assert_quoted, prepare_session, render_quote, QuoteCommandParameters};
use crate::constants::DEFAULT_WATCH_UPDATES;
use crate::core::context::Context;
use crate::core::Error;

#[derive(Args, Clone, Debug)]
pub struct WatchCommandParameters {
    #[command(flatten)]
    pub quote: QuoteCommandParameters,

    #[clap(long, default_value_t = DEFAULT_WATCH_UPDATES, help = "Stop after this many price updates (0 to run until interrupted)")]
    pub updates: usize,
}

/// Prints the quote again after every price refresh. Returns the number of updates printed.
pub async fn follow(session: &mut SwapSession, updates: usize, mut print: impl FnMut(String)) -> usize {
    let mut received = 0;
    while updates == 0 || received < updates {
        let state = session.next().await;
        received += 1;

        match assert_quoted(state) {
            Ok(()) => print(render_quote(state)),
            Err(e) => warn!("{}", e),
        }
    }

    received
}

pub async fn command_watch(context: &Context, params: WatchCommandParameters) -> Result<(), Error> {
    let oracle: Arc<dyn PriceOracle> = Arc::new(context.price_client()?);
    let mut session = prepare_session(oracle, &params.quote).await?;

    assert_quoted(session.state())?;
    println!("{}\n", render_quote(session.state()));

    info!("⏱️ Watching prices, press Ctrl-C to stop");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        received = follow(&mut session, params.updates, |x| println!("{}\n", x)) => info!("received {} updates", received),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use swapcalc_prices::mock::StaticPriceOracle;
    use swapcalc_prices::{Client, TokenMetadata};

    use super::*;
    use crate::command::quote::AmountParameters;

    fn metadata(symbol: &str, chain_id: &str, address: &str) -> TokenMetadata {
        TokenMetadata {
            symbol: symbol.to_string(),
            chain_id: chain_id.to_string(),
            address: address.to_string(),
            name: symbol.to_string(),
            decimals: 18,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refreshed_prices_update_the_quote() {
        // Given
        let oracle = Arc::new(
            StaticPriceOracle::default()
                .with_metadata(metadata("UNI", "1", "0x1f98"))
                .with_metadata(metadata("LINK", "1", "0x5149"))
                .with_price("1", "0x1f98", 10.0)
                .with_price("1", "0x5149", 20.0),
        );
        let params = QuoteCommandParameters {
            from: "UNI".to_string(),
            to: "LINK".to_string(),
            amounts: AmountParameters {
                amount: Some("10".to_string()),
                usd: None,
                to_amount: None,
                to_usd: None,
            },
        };

        let client: Arc<dyn PriceOracle> = Arc::new(Client::from_mock(oracle.clone()));
        let mut session = prepare_session(client, &params).await.unwrap();
        assert_eq!(session.state().target.amount, "5");

        // When
        oracle.set_price("1", "0x1f98", 40.0);
        let mut printed = vec![];
        tokio::time::sleep(Duration::from_secs(31)).await;
        let received = follow(&mut session, 2, |x| printed.push(x)).await;

        // Then
        assert_eq!(received, 2);
        assert_eq!(printed.len(), 2);
        assert_eq!(session.state().target.amount, "20");
        assert_eq!(session.state().source.usd, "400.00");
    }
}
