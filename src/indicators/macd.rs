// =============================================================================
// MACD: Moving Average Convergence / Divergence
// =============================================================================
//
//   macd      = EMA_fast(close) - EMA_slow(close)   (once the slow EMA is stable)
//   signal    = EMA_signal(macd)
//   histogram = macd - signal
//
// Crossover compares the (macd, signal) pair of the final bar with the pair of
// the bar immediately before it. Both pairs come out of one forward pass of the
// EMA recurrence; the pass keeps only the previous snapshot.
//
//   BULLISH  prev macd <  prev signal  and  macd > signal
//   BEARISH  prev macd >= prev signal  and  macd < signal
//   NEUTRAL  otherwise
//
// Without a previous pair the classification falls back to the current
// relative position of the two lines.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MacdParams;
use crate::error::{EngineError, EngineResult};
use crate::indicators::ema::Ema;
use crate::indicators::BarsBySymbol;
use crate::types::{closes, Crossover};

/// MACD and signal line values at one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdSnapshot {
    pub macd: f64,
    pub signal: f64,
}

/// Final-bar MACD output for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdResult {
    pub symbol: String,
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub crossover: Crossover,
}

/// Final-bar MACD values, before a symbol is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub crossover: Crossover,
}

/// Calculate MACD for `closes`, requiring at least `slow + signal` samples.
pub fn calculate_macd(closes: &[f64], params: &MacdParams) -> EngineResult<MacdReading> {
    let required = params.min_samples();
    if closes.len() < required {
        return Err(EngineError::insufficient("MACD", required, closes.len()));
    }

    let mut fast = Ema::new(params.fast);
    let mut slow = Ema::new(params.slow);
    let mut signal_line = Ema::new(params.signal);

    let mut previous: Option<MacdSnapshot> = None;
    let mut current: Option<MacdSnapshot> = None;

    for &close in closes {
        let fast_value = fast.update(close);
        let slow_value = slow.update(close);
        if !slow.is_stable() {
            continue;
        }

        let macd = fast_value - slow_value;
        let signal = signal_line.update(macd);
        if !signal_line.is_stable() {
            continue;
        }

        previous = current.replace(MacdSnapshot { macd, signal });
    }

    let current = current.ok_or_else(|| EngineError::insufficient("MACD", required, closes.len()))?;
    if !current.macd.is_finite() || !current.signal.is_finite() {
        return Err(EngineError::NonFinite { indicator: "MACD" });
    }

    Ok(MacdReading {
        macd: current.macd,
        signal: current.signal,
        histogram: current.macd - current.signal,
        crossover: classify_crossover(previous, current),
    })
}

/// Classify the crossover between the previous and the current pair.
pub fn classify_crossover(previous: Option<MacdSnapshot>, current: MacdSnapshot) -> Crossover {
    match previous {
        Some(prev) => {
            let was_below = prev.macd < prev.signal;
            if was_below && current.macd > current.signal {
                Crossover::Bullish
            } else if !was_below && current.macd < current.signal {
                Crossover::Bearish
            } else {
                Crossover::Neutral
            }
        }
        None => {
            if current.macd > current.signal {
                Crossover::Bullish
            } else if current.macd < current.signal {
                Crossover::Bearish
            } else {
                Crossover::Neutral
            }
        }
    }
}

/// Calculate MACD for every symbol. Symbols shorter than `slow + signal`
/// bars are logged and omitted.
pub fn evaluate_macd_signals(bars: &BarsBySymbol, params: &MacdParams) -> BTreeMap<String, MacdResult> {
    let mut results = BTreeMap::new();

    for (symbol, series) in bars {
        match calculate_macd(&closes(series), params) {
            Ok(reading) => {
                results.insert(
                    symbol.clone(),
                    MacdResult {
                        symbol: symbol.clone(),
                        macd: reading.macd,
                        signal: reading.signal,
                        histogram: reading.histogram,
                        crossover: reading.crossover,
                    },
                );
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
                    "[MACD] Insufficient data for {symbol}. Need at least {required} data points, got {available}"
                );
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "[MACD] Could not calculate MACD");
            }
        }
    }

    results
}
