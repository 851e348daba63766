// =============================================================================
// Market-data collaborators
// =============================================================================
//
// The engine consumes three capabilities. Each is a single async trait; the
// caller picks an implementation (live HTTP adapter or in-memory double) at
// construction time.

use async_trait::async_trait;

use anyhow::Result;

use crate::indicators::BarsBySymbol;
use crate::types::{LatestPrices, OptionChain};

pub mod alpaca;
pub mod mock;
pub mod pacer;
pub mod yahoo;

pub use alpaca::AlpacaClient;
pub use mock::{MockOptionsProvider, StaticMarketData};
pub use pacer::{PacerSnapshot, RequestPacer};
pub use yahoo::YahooOptionsProvider;

/// Daily bar history for a set of symbols.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    async fn get_bars(&self, symbols: &[String], lookback_days: u32) -> Result<BarsBySymbol>;
}

/// Most recent traded price for a set of symbols. Symbols without a quote
/// are absent from the returned map.
#[async_trait]
pub trait LatestPriceProvider: Send + Sync {
    async fn get_latest_prices(&self, symbols: &[String]) -> Result<LatestPrices>;
}

/// Nearest-expiry option chain for one symbol. Fails when the symbol has no
/// listed chain.
#[async_trait]
pub trait OptionsChainProvider: Send + Sync {
    async fn get_latest_option_chain(&self, symbol: &str) -> Result<OptionChain>;
}
