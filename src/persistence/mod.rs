// =============================================================================
// Run Persistence
// =============================================================================
//
// One `run_executions` row per run and one `run_signals` row per composite
// signal. Writes are best effort: the runner logs a failed write and moves on.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signals::CompositeSignal;
use crate::types::{BandSignalKind, Crossover, RsiSignal, RunStatus};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRunLogger;
pub use postgres::PostgresRunLogger;

/// Outcome of one scheduled run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: RunStatus,
    pub environment: String,
    pub duration_ms: i64,
    pub tickers_checked: usize,
    pub cron_trigger: Option<String>,
    pub bollinger_signals_found: usize,
    pub rsi_signals_found: usize,
    pub macd_signals_found: usize,
}

/// Flattened composite signal as stored in `run_signals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSignalRecord {
    pub ticker: String,
    pub detected_at: DateTime<Utc>,
    pub bollinger_signal: BandSignalKind,
    pub current_price: f64,
    pub upper_band: f64,
    pub lower_band: f64,
    pub rsi_value: Option<f64>,
    pub rsi_signal: Option<RsiSignal>,
    pub macd_value: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub macd_crossover: Option<Crossover>,
}

impl RunSignalRecord {
    pub fn from_signal(signal: &CompositeSignal, detected_at: DateTime<Utc>) -> Self {
        Self {
            ticker: signal.symbol.clone(),
            detected_at,
            bollinger_signal: signal.kind,
            current_price: signal.current_price,
            upper_band: signal.upper_band,
            lower_band: signal.lower_band,
            rsi_value: signal.rsi.as_ref().map(|r| r.rsi),
            rsi_signal: signal.rsi.as_ref().map(|r| r.signal),
            macd_value: signal.macd.as_ref().map(|m| m.macd),
            macd_signal: signal.macd.as_ref().map(|m| m.signal),
            macd_histogram: signal.macd.as_ref().map(|m| m.histogram),
            macd_crossover: signal.macd.as_ref().map(|m| m.crossover),
        }
    }
}

#[async_trait]
pub trait PersistenceLogger: Send + Sync {
    /// Store a run and return its id.
    async fn log_run(&self, summary: &RunSummary) -> Result<i64>;

    async fn log_signal(&self, run_id: i64, record: &RunSignalRecord) -> Result<()>;
}
