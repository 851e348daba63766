// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator calculators. Every accumulator lives for
// the duration of one call, so symbols can be evaluated in parallel without
// synchronisation. Single-series functions return `EngineResult`; the batch
// `evaluate_*` functions log and drop symbols that cannot be evaluated.

use std::collections::BTreeMap;

use crate::types::Bar;

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

pub use bollinger::{
    calculate_bollinger, evaluate_bollinger_bands, is_near_or_past_lower_band,
    is_near_or_past_upper_band, BollingerBandResult,
};
pub use macd::{calculate_macd, evaluate_macd_signals, MacdResult};
pub use rsi::{calculate_rsi, evaluate_rsi_signals, RsiResult};

/// Daily bars keyed by symbol, each series ordered oldest first.
pub type BarsBySymbol = BTreeMap<String, Vec<Bar>>;
