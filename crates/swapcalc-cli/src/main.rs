use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

mod command;
pub mod constants;
pub mod core;
pub mod validation;

use crate::command::quote::{command_quote, QuoteCommandParameters};
use crate::command::tokens::{command_tokens, TokensCommandParameters};
use crate::command::watch::{command_watch, WatchCommandParameters};
use crate::core::context::{Context, ContextParameters};
use crate::core::{Error, Fmt};

#[derive(Parser)]
#[command(name = "swapcalc", about = "Convert amounts between tokens using live USD prices")]
struct Cli {
    #[command(flatten)]
    context: ContextParameters,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List the supported tokens, optionally with their current price")]
    Tokens(TokensCommandParameters),

    #[command(about = "Convert an amount from one token to another")]
    Quote(QuoteCommandParameters),

    #[command(about = "Keep a quote up to date as prices refresh")]
    Watch(WatchCommandParameters),
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let context = Context::load(&cli.context)?;

    let subscriber = Registry::default().with(Fmt::layer(&context.configuration.verbosity));
    tracing::subscriber::set_global_default(subscriber).map_err(|e| Error::Configuration(e.to_string()))?;

    match cli.command {
        Commands::Tokens(params) => command_tokens(&context, params).await?,
        Commands::Quote(params) => command_quote(&context, params).await?,
        Commands::Watch(params) => command_watch(&context, params).await?,
    }

    Ok(())
}
