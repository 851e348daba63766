// =============================================================================
// In-memory collaborators
// =============================================================================
//
// `MockOptionsProvider` returns canned chains instead of calling an API and
// fails for unknown symbols, mirroring a missing chain upstream.
// `StaticMarketData` serves fixed bars and prices for dry runs and tests.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use crate::indicators::BarsBySymbol;
use crate::providers::{LatestPriceProvider, OptionsChainProvider, PriceHistoryProvider};
use crate::types::{LatestPrices, OptionChain, OptionContract};

pub struct MockOptionsProvider {
    chains: RwLock<HashMap<String, OptionChain>>,
}

impl MockOptionsProvider {
    /// Provider seeded with an AAPL chain.
    pub fn new() -> Self {
        let mut chains = HashMap::new();
        chains.insert(
            "AAPL".to_string(),
            OptionChain {
                calls: vec![
                    OptionContract::new(220.0, 2.5).with_quotes(2.45, 2.55, 0.25),
                    OptionContract::new(225.0, 1.8).with_quotes(1.75, 1.85, 0.23),
                    OptionContract::new(230.0, 1.2).with_quotes(1.15, 1.25, 0.21),
                ],
                puts: vec![
                    OptionContract::new(200.0, 1.8).with_quotes(1.75, 1.85, 0.22),
                    OptionContract::new(195.0, 1.2).with_quotes(1.15, 1.25, 0.2),
                    OptionContract::new(190.0, 0.8).with_quotes(0.75, 0.85, 0.18),
                ],
            },
        );
        Self {
            chains: RwLock::new(chains),
        }
    }

    /// Provider with no chains at all.
    pub fn empty() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_mock_data(&self, symbol: impl Into<String>, chain: OptionChain) {
        self.chains.write().insert(symbol.into(), chain);
    }
}

impl Default for MockOptionsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OptionsChainProvider for MockOptionsProvider {
    async fn get_latest_option_chain(&self, symbol: &str) -> Result<OptionChain> {
        info!(symbol, "[MockOptionsProvider] Returning mock options chain");
        self.chains
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No mock data available for symbol: {symbol}"))
    }
}

/// Fixed bar history and quotes.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    pub bars: BarsBySymbol,
    pub prices: LatestPrices,
}

impl StaticMarketData {
    pub fn new(bars: BarsBySymbol, prices: LatestPrices) -> Self {
        Self { bars, prices }
    }
}

#[async_trait]
impl PriceHistoryProvider for StaticMarketData {
    async fn get_bars(&self, symbols: &[String], _lookback_days: u32) -> Result<BarsBySymbol> {
        Ok(symbols
            .iter()
            .filter_map(|s| self.bars.get(s).map(|b| (s.clone(), b.clone())))
            .collect())
    }
}

#[async_trait]
impl LatestPriceProvider for StaticMarketData {
    async fn get_latest_prices(&self, symbols: &[String]) -> Result<LatestPrices> {
        Ok(symbols
            .iter()
            .filter_map(|s| self.prices.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }
}
