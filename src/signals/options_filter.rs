// =============================================================================
// Options Filter: out-of-the-money selection and table rendering
// =============================================================================
//
// Selection keeps the provider's ordering and truncates; it never re-sorts.
// =============================================================================

use crate::types::{BandSignalKind, OptionChain, OptionContract};

/// Header row matching the columns of `build_options_table`.
pub const OPTIONS_TABLE_TITLE: &str = "strike | lastPrice | bid | ask | iv";

/// Calls with a strike above `current_price`, first `limit` in provider order.
pub fn filter_out_of_the_money_call_options(
    calls: &[OptionContract],
    current_price: f64,
    limit: usize,
) -> Vec<OptionContract> {
    calls
        .iter()
        .filter(|c| c.strike > current_price)
        .take(limit)
        .cloned()
        .collect()
}

/// Puts with a strike below `current_price`, first `limit` in provider order.
pub fn filter_out_of_the_money_put_options(
    puts: &[OptionContract],
    current_price: f64,
    limit: usize,
) -> Vec<OptionContract> {
    puts.iter()
        .filter(|p| p.strike < current_price)
        .take(limit)
        .cloned()
        .collect()
}

/// Pick the side of the chain that matches the trigger.
pub fn select_options(
    kind: BandSignalKind,
    chain: &OptionChain,
    current_price: f64,
    limit: usize,
) -> Vec<OptionContract> {
    match kind {
        BandSignalKind::SellCall => filter_out_of_the_money_call_options(&chain.calls, current_price, limit),
        BandSignalKind::SellPut => filter_out_of_the_money_put_options(&chain.puts, current_price, limit),
    }
}

/// Render one `strike | lastPrice | bid | ask | iv` row per contract.
/// Prices use 2 decimals, implied volatility 6; absent values print `0`.
pub fn build_options_table(contracts: &[OptionContract]) -> String {
    contracts
        .iter()
        .map(|c| {
            [
                format!("{:.2}", c.strike),
                format!("{:.2}", c.last_price),
                optional_cell(c.bid, 2),
                optional_cell(c.ask, 2),
                optional_cell(c.implied_volatility, 6),
            ]
            .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn optional_cell(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "0".to_string(),
    }
}
