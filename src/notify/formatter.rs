// =============================================================================
// Signal Formatter: display strings for composite signals
// =============================================================================
//
// Status glyphs live here and nowhere else; the core types carry enums only.
// =============================================================================

use crate::indicators::{MacdResult, RsiResult};
use crate::signals::{build_options_table, CompositeSignal, OPTIONS_TABLE_TITLE};
use crate::types::{BandSignalKind, Crossover, RsiStatus};

/// Display strings for one band signal.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedBandSignal {
    pub result_title: String,
    pub result_value: String,
    pub options_table_title: String,
    pub options_table: String,
}

pub fn format_band_signal(signal: &CompositeSignal, threshold_pct: f64) -> FormattedBandSignal {
    let (result_title, result_value) = match signal.kind {
        BandSignalKind::SellCall => (
            format!("Passed Upper band or within {threshold_pct}%"),
            format!("Current: {:.2} \n Upper: {:.2}", signal.current_price, signal.upper_band),
        ),
        BandSignalKind::SellPut => (
            format!("Passed Lower band or within {threshold_pct}%"),
            format!("Current: {:.2} \n Lower: {:.2}", signal.current_price, signal.lower_band),
        ),
    };

    FormattedBandSignal {
        result_title,
        result_value,
        options_table_title: OPTIONS_TABLE_TITLE.to_string(),
        options_table: build_options_table(&signal.selected_options),
    }
}

/// Short action label for the signal side.
pub fn action_label(kind: BandSignalKind) -> &'static str {
    match kind {
        BandSignalKind::SellCall => "Sell CALLS",
        BandSignalKind::SellPut => "Sell PUTS",
    }
}

pub fn rsi_glyph(status: RsiStatus) -> &'static str {
    match status {
        RsiStatus::Overbought => "🔴",
        RsiStatus::Oversold => "🟢",
        RsiStatus::Neutral => "⚪",
    }
}

pub fn crossover_glyph(crossover: Crossover) -> &'static str {
    match crossover {
        Crossover::Bullish => "📈",
        Crossover::Bearish => "📉",
        Crossover::Neutral => "➖",
    }
}

/// e.g. `🔴 RSI 74.12 OVERBOUGHT (SELL)`
pub fn format_rsi_context(rsi: &RsiResult) -> String {
    let status = rsi.status();
    format!("{} RSI {:.2} {} ({})", rsi_glyph(status), rsi.rsi, status, rsi.signal)
}

/// e.g. `📈 MACD 1.2345 / signal 0.9876 / hist 0.2469 BULLISH`
pub fn format_macd_context(macd: &MacdResult) -> String {
    format!(
        "{} MACD {:.4} / signal {:.4} / hist {:.4} {}",
        crossover_glyph(macd.crossover),
        macd.macd,
        macd.signal,
        macd.histogram,
        macd.crossover
    )
}
