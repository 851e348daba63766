// =============================================================================
// Band Watch: technical indicator signal engine
// =============================================================================
//
// Daily bars and latest prices in, option-selling signals out. Bollinger
// Bands decide whether a symbol triggers; RSI and MACD ride along as context.
// =============================================================================

pub mod config;
pub mod error;
pub mod indicators;
pub mod notify;
pub mod persistence;
pub mod providers;
pub mod runner;
pub mod signals;
pub mod types;

#[cfg(test)]
pub(crate) mod test_http;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use runner::{RunReport, Runner};
