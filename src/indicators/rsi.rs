// =============================================================================
// Relative Strength Index (RSI): Wilder's Smoothing
// =============================================================================
//
// Step 1: Compute price changes (deltas) from consecutive closes.
// Step 2: Seed average gain / average loss with the SMA of the first
//          `period` gains / losses (or of every delta when only `period`
//          closes are available).
// Step 3: Apply Wilder's smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4: RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS), and 100 when avg_loss is zero.
//
// Default thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RsiParams;
use crate::error::{EngineError, EngineResult};
use crate::indicators::BarsBySymbol;
use crate::types::{closes, RsiSignal, RsiStatus};

/// RSI reading for one symbol with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiResult {
    pub symbol: String,
    pub rsi: f64,
    pub is_overbought: bool,
    pub is_oversold: bool,
    pub signal: RsiSignal,
}

impl RsiResult {
    /// Classify an RSI value against the configured thresholds.
    pub fn classify(symbol: impl Into<String>, rsi: f64, params: &RsiParams) -> Self {
        let is_overbought = rsi > params.overbought;
        let is_oversold = rsi < params.oversold;

        let signal = if is_oversold {
            RsiSignal::Buy
        } else if is_overbought {
            RsiSignal::Sell
        } else {
            RsiSignal::Neutral
        };

        Self {
            symbol: symbol.into(),
            rsi,
            is_overbought,
            is_oversold,
            signal,
        }
    }

    pub fn status(&self) -> RsiStatus {
        if self.is_overbought {
            RsiStatus::Overbought
        } else if self.is_oversold {
            RsiStatus::Oversold
        } else {
            RsiStatus::Neutral
        }
    }
}

/// Compute the RSI series for `closes`.
///
/// The first value is produced once the averages are seeded; every further
/// close adds one Wilder-smoothed value.
pub fn calculate_rsi_series(closes: &[f64], period: usize) -> EngineResult<Vec<f64>> {
    let required = period.max(2);
    if closes.len() < required {
        return Err(EngineError::insufficient("RSI", required, closes.len()));
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    // --- Seed averages ------------------------------------------------------
    let seed = period.min(deltas.len());
    let (sum_gain, sum_loss) = deltas[..seed].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / seed as f64;
    let mut avg_loss = sum_loss / seed as f64;

    let mut result = Vec::with_capacity(deltas.len() - seed + 1);
    result.push(rsi_from_averages(avg_gain, avg_loss)?);

    // --- Wilder's smoothing -------------------------------------------------
    for &delta in &deltas[seed..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        result.push(rsi_from_averages(avg_gain, avg_loss)?);
    }

    Ok(result)
}

/// Most recent RSI value for `closes`.
pub fn calculate_rsi(closes: &[f64], period: usize) -> EngineResult<f64> {
    let series = calculate_rsi_series(closes, period)?;
    series
        .last()
        .copied()
        .ok_or_else(|| EngineError::insufficient("RSI", period.max(2), closes.len()))
}

/// Compute and classify RSI for every symbol. Symbols with fewer than
/// `period` bars are logged and omitted.
pub fn evaluate_rsi_signals(bars: &BarsBySymbol, params: &RsiParams) -> BTreeMap<String, RsiResult> {
    let mut results = BTreeMap::new();

    for (symbol, series) in bars {
        match calculate_rsi(&closes(series), params.period) {
            Ok(value) => {
                results.insert(symbol.clone(), RsiResult::classify(symbol, value, params));
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
                    "[RSI] Insufficient data for {symbol}. Need at least {required} data points, got {available}"
                );
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "[RSI] Could not calculate RSI");
            }
        }
    }

    results
}

// =============================================================================
// Internal helpers
// =============================================================================

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> EngineResult<f64> {
    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Ok(rsi.clamp(0.0, 100.0))
    } else {
        Err(EngineError::NonFinite { indicator: "RSI" })
    }
}
