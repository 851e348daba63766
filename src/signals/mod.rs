// =============================================================================
// Signals Module
// =============================================================================
//
// Turns indicator output into actionable signals:
// - Band evaluation (SELL_CALL / SELL_PUT triggers)
// - Out-of-the-money option selection and table rendering
// - Aggregation of triggers, option chains and RSI / MACD context

pub mod aggregator;
pub mod evaluator;
pub mod options_filter;

pub use aggregator::{CompositeSignal, Evaluation, SignalAggregator};
pub use evaluator::{classify_band_position, evaluate_band_triggers, BandTrigger};
pub use options_filter::{
    build_options_table, filter_out_of_the_money_call_options,
    filter_out_of_the_money_put_options, select_options, OPTIONS_TABLE_TITLE,
};
