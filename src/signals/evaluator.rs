// =============================================================================
// Band Evaluator: turns Bollinger bands + live price into a trigger
// =============================================================================
//
// The upper test runs first; a symbol that passes it is never checked against
// the lower band, so one run classifies a symbol at most once.
// =============================================================================

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::indicators::{is_near_or_past_lower_band, is_near_or_past_upper_band, BollingerBandResult};
use crate::types::{BandSignalKind, LatestPrices};

/// A symbol whose live price sits at or near one of its outer bands.
#[derive(Debug, Clone, PartialEq)]
pub struct BandTrigger {
    pub symbol: String,
    pub kind: BandSignalKind,
    pub current_price: f64,
    pub bands: BollingerBandResult,
}

/// Classify `price` against `bands`. `None` means the price is comfortably
/// inside the envelope.
pub fn classify_band_position(
    price: f64,
    bands: &BollingerBandResult,
    threshold_pct: f64,
) -> Option<BandSignalKind> {
    if is_near_or_past_upper_band(price, bands.upper, threshold_pct) {
        Some(BandSignalKind::SellCall)
    } else if is_near_or_past_lower_band(price, bands.lower, threshold_pct) {
        Some(BandSignalKind::SellPut)
    } else {
        None
    }
}

/// Evaluate every symbol that has both bands and a live price.
pub fn evaluate_band_triggers(
    bands: &BTreeMap<String, BollingerBandResult>,
    latest_prices: &LatestPrices,
    threshold_pct: f64,
) -> Vec<BandTrigger> {
    let mut triggers = Vec::new();

    for (symbol, band) in bands {
        let Some(&price) = latest_prices.get(symbol) else {
            warn!(symbol = %symbol, "[BandEvaluator] No latest price — skipping");
            continue;
        };
        if !price.is_finite() || price <= 0.0 {
            warn!(symbol = %symbol, price, "[BandEvaluator] Invalid latest price — skipping");
            continue;
        }

        match classify_band_position(price, band, threshold_pct) {
            Some(kind) => {
                debug!(symbol = %symbol, %kind, price, upper = band.upper, lower = band.lower, "band triggered");
                triggers.push(BandTrigger {
                    symbol: symbol.clone(),
                    kind,
                    current_price: price,
                    bands: *band,
                });
            }
            None => debug!(symbol = %symbol, price, "inside bands"),
        }
    }

    triggers
}
