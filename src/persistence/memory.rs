use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::persistence::{PersistenceLogger, RunSignalRecord, RunSummary};

/// Run history kept in process memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryRunLogger {
    next_id: AtomicI64,
    runs: Mutex<Vec<(i64, RunSummary)>>,
    signals: Mutex<Vec<(i64, RunSignalRecord)>>,
}

impl InMemoryRunLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<(i64, RunSummary)> {
        self.runs.lock().clone()
    }

    pub fn signals(&self) -> Vec<(i64, RunSignalRecord)> {
        self.signals.lock().clone()
    }
}

#[async_trait]
impl PersistenceLogger for InMemoryRunLogger {
    async fn log_run(&self, summary: &RunSummary) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.runs.lock().push((id, summary.clone()));
        Ok(id)
    }

    async fn log_signal(&self, run_id: i64, record: &RunSignalRecord) -> Result<()> {
        if !self.runs.lock().iter().any(|(id, _)| *id == run_id) {
            anyhow::bail!("unknown run id {run_id}");
        }
        self.signals.lock().push((run_id, record.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BandSignalKind, RunStatus};
    use chrono::Utc;

    fn summary() -> RunSummary {
        let now = Utc::now();
        RunSummary {
            started_at: now,
            completed_at: now,
            status: RunStatus::Success,
            environment: "test".into(),
            duration_ms: 0,
            tickers_checked: 2,
            cron_trigger: None,
            bollinger_signals_found: 0,
            rsi_signals_found: 0,
            macd_signals_found: 0,
        }
    }

    fn record() -> RunSignalRecord {
        RunSignalRecord {
            ticker: "AAPL".into(),
            detected_at: Utc::now(),
            bollinger_signal: BandSignalKind::SellPut,
            current_price: 1.0,
            upper_band: 2.0,
            lower_band: 1.0,
            rsi_value: None,
            rsi_signal: None,
            macd_value: None,
            macd_signal: None,
            macd_histogram: None,
            macd_crossover: None,
        }
    }

    #[tokio::test]
    async fn run_ids_are_sequential() {
        let logger = InMemoryRunLogger::new();
        assert_eq!(logger.log_run(&summary()).await.unwrap(), 1);
        assert_eq!(logger.log_run(&summary()).await.unwrap(), 2);
        assert_eq!(logger.runs().len(), 2);
    }

    #[tokio::test]
    async fn signal_requires_existing_run() {
        let logger = InMemoryRunLogger::new();
        assert!(logger.log_signal(7, &record()).await.is_err());

        let id = logger.log_run(&summary()).await.unwrap();
        logger.log_signal(id, &record()).await.unwrap();
        assert_eq!(logger.signals()[0].0, id);
    }
}
