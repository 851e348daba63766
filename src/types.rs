// =============================================================================
// Shared types used across the Band Watch signal engine
// =============================================================================

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Latest traded price keyed by symbol.
pub type LatestPrices = BTreeMap<String, f64>;

/// A single daily price observation for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDate,
    pub close_price: f64,
    pub symbol: String,
}

impl Bar {
    pub fn new(symbol: impl Into<String>, timestamp: NaiveDate, close_price: f64) -> Self {
        Self {
            timestamp,
            close_price,
            symbol: symbol.into(),
        }
    }
}

/// Extract the close prices of a bar series, oldest first.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close_price).collect()
}

/// A single option contract as returned by an options-chain provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    pub strike: f64,
    pub last_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<f64>,
}

impl OptionContract {
    /// Contract carrying only the mandatory fields.
    pub fn new(strike: f64, last_price: f64) -> Self {
        Self {
            strike,
            last_price,
            bid: None,
            ask: None,
            implied_volatility: None,
        }
    }

    pub fn with_quotes(mut self, bid: f64, ask: f64, implied_volatility: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self.implied_volatility = Some(implied_volatility);
        self
    }
}

/// Calls and puts for the nearest expiry of a symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

/// Which side of the Bollinger envelope a symbol triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandSignalKind {
    /// Price at or near the upper band: sell out-of-the-money calls.
    SellCall,
    /// Price at or near the lower band: sell out-of-the-money puts.
    SellPut,
}

impl BandSignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SellCall => "SELL_CALL",
            Self::SellPut => "SELL_PUT",
        }
    }
}

impl std::fmt::Display for BandSignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading bias derived from RSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiSignal {
    Buy,
    Sell,
    Neutral,
}

impl std::fmt::Display for RsiSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Zone the RSI value currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiStatus {
    Overbought,
    Oversold,
    Neutral,
}

impl std::fmt::Display for RsiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Oversold => write!(f, "OVERSOLD"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Direction of the most recent MACD / signal-line relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Crossover {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for Crossover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Outcome of a whole scheduled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
