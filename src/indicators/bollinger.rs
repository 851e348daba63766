// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA of the last `period` closes, upper / lower = middle ± k·σ
// where σ is the population standard deviation of the same window.
//
// The near-band predicates anchor the cushion to the band, not to the price:
//   upper test:  price >= upper * (1 - T/100)
//   lower test:  price <= lower * (1 + T/100)
// Both are inclusive at equality.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::BollingerParams;
use crate::error::{EngineError, EngineResult};
use crate::indicators::BarsBySymbol;
use crate::types::closes;

use std::collections::BTreeMap;

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBandResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate Bollinger Bands over the most recent `period` closes.
///
/// Fails with `InsufficientData` when fewer than `period` closes are given,
/// and with `NonFinite` when the window contains NaN or infinite prices.
pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> EngineResult<BollingerBandResult> {
    if period == 0 || closes.len() < period {
        return Err(EngineError::insufficient("Bollinger", period.max(1), closes.len()));
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + multiplier * std_dev;
    let lower = middle - multiplier * std_dev;

    if upper.is_finite() && lower.is_finite() {
        Ok(BollingerBandResult {
            upper,
            middle,
            lower,
        })
    } else {
        Err(EngineError::NonFinite {
            indicator: "Bollinger",
        })
    }
}

/// True if `price` is above the upper band or within `threshold_pct` percent
/// below it.
pub fn is_near_or_past_upper_band(price: f64, upper_band: f64, threshold_pct: f64) -> bool {
    price >= upper_band * (1.0 - threshold_pct / 100.0)
}

/// True if `price` is below the lower band or within `threshold_pct` percent
/// above it.
pub fn is_near_or_past_lower_band(price: f64, lower_band: f64, threshold_pct: f64) -> bool {
    price <= lower_band * (1.0 + threshold_pct / 100.0)
}

/// Compute bands for every symbol. Symbols that cannot be evaluated are
/// logged and left out of the returned map.
pub fn evaluate_bollinger_bands(
    bars: &BarsBySymbol,
    params: &BollingerParams,
) -> BTreeMap<String, BollingerBandResult> {
    let mut results = BTreeMap::new();

    for (symbol, series) in bars {
        match calculate_bollinger(&closes(series), params.period, params.multiplier) {
            Ok(bands) => {
                results.insert(symbol.clone(), bands);
            }
            Err(EngineError::InsufficientData {
                required,
                available,
                ..
            }) => {
                warn!(
                    symbol = %symbol,
                    required,
                    available,
                    "[Bollinger] Insufficient data for {symbol}. Need at least {required} data points, got {available}"
                );
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "[Bollinger] Could not calculate bands");
            }
        }
    }

    results
}
