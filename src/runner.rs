// =============================================================================
// Runner: one complete check over the configured symbols
// =============================================================================
//
// validate → fetch bars + prices concurrently → evaluate → notify → persist
//
// A failed bar or price fetch ends the run early with status `failed`; it is
// still summarised and persisted. Notification and persistence failures are
// logged and never change the run outcome.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::future::join;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::notify::{DeliveryReport, Notifier};
use crate::persistence::{PersistenceLogger, RunSignalRecord, RunSummary};
use crate::providers::{LatestPriceProvider, OptionsChainProvider, PriceHistoryProvider};
use crate::signals::{Evaluation, SignalAggregator};
use crate::types::RunStatus;

/// Everything a single run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub evaluation: Evaluation,
    pub delivery: DeliveryReport,
    /// Id assigned by the persistence layer, if the run was stored.
    pub run_id: Option<i64>,
}

pub struct Runner {
    history: Arc<dyn PriceHistoryProvider>,
    prices: Arc<dyn LatestPriceProvider>,
    aggregator: SignalAggregator,
    notifier: Option<Arc<dyn Notifier>>,
    logger: Option<Arc<dyn PersistenceLogger>>,
}

impl Runner {
    pub fn new(
        config: EngineConfig,
        history: Arc<dyn PriceHistoryProvider>,
        prices: Arc<dyn LatestPriceProvider>,
        options: Arc<dyn OptionsChainProvider>,
    ) -> Self {
        Self {
            history,
            prices,
            aggregator: SignalAggregator::new(config, options),
            notifier: None,
            logger: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn PersistenceLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        self.aggregator.config()
    }

    pub async fn run_once(&self, cron_trigger: Option<&str>) -> EngineResult<RunReport> {
        let config = self.config();
        config.validate()?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let run_key = Uuid::new_v4();
        info!(%run_key, symbols = ?config.symbols, trigger = ?cron_trigger, "Run started");

        let (bars, prices) = join(
            self.history.get_bars(&config.symbols, config.lookback_days),
            self.prices.get_latest_prices(&config.symbols),
        )
        .await;

        let (status, evaluation) = match (bars, prices) {
            (Ok(bars), Ok(prices)) => {
                let evaluation = self.aggregator.evaluate(&bars, &prices).await?;
                (RunStatus::Success, evaluation)
            }
            (bars, prices) => {
                if let Err(e) = bars {
                    error!(error = %e, "Failed to fetch bar history");
                }
                if let Err(e) = prices {
                    error!(error = %e, "Failed to fetch latest prices");
                }
                (RunStatus::Failed, Evaluation::default())
            }
        };

        let delivery = match &self.notifier {
            Some(notifier) if !evaluation.signals.is_empty() => notifier.notify(&evaluation.signals).await,
            _ => DeliveryReport::default(),
        };

        let completed_at = Utc::now();
        let summary = RunSummary {
            started_at,
            completed_at,
            status,
            environment: config.environment.clone(),
            duration_ms: clock.elapsed().as_millis() as i64,
            tickers_checked: config.symbols.len(),
            cron_trigger: cron_trigger.map(str::to_string),
            bollinger_signals_found: evaluation.bollinger_signals_found(),
            rsi_signals_found: evaluation.rsi_signals_found(),
            macd_signals_found: evaluation.macd_signals_found(),
        };

        let run_id = self.persist(&summary, &evaluation).await;

        info!(
            %run_key,
            status = %summary.status,
            duration_ms = summary.duration_ms,
            signals = summary.bollinger_signals_found,
            delivered = delivery.success_count,
            undelivered = delivery.failure_count,
            "Run finished"
        );

        Ok(RunReport {
            summary,
            evaluation,
            delivery,
            run_id,
        })
    }

    async fn persist(&self, summary: &RunSummary, evaluation: &Evaluation) -> Option<i64> {
        let logger = self.logger.as_ref()?;

        let run_id = match logger.log_run(summary).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "[RunExecution] Failed to insert record");
                return None;
            }
        };

        for signal in &evaluation.signals {
            let record = RunSignalRecord::from_signal(signal, summary.completed_at);
            if let Err(e) = logger.log_signal(run_id, &record).await {
                warn!(run_id, symbol = %signal.symbol, error = %e, "[RunSignal] Failed to insert record");
            }
        }

        Some(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::indicators::test_support::bars_from;
    use crate::indicators::BarsBySymbol;
    use crate::persistence::InMemoryRunLogger;
    use crate::providers::{MockOptionsProvider, StaticMarketData};
    use crate::signals::CompositeSignal;
    use crate::types::{LatestPrices, OptionChain, OptionContract};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, signals: &[CompositeSignal]) -> DeliveryReport {
            self.seen.lock().extend(signals.iter().map(|s| s.symbol.clone()));
            DeliveryReport {
                success_count: signals.len(),
                failure_count: 0,
            }
        }
    }

    struct FailingHistory;

    #[async_trait]
    impl PriceHistoryProvider for FailingHistory {
        async fn get_bars(&self, _symbols: &[String], _lookback_days: u32) -> anyhow::Result<BarsBySymbol> {
            anyhow::bail!("upstream unavailable")
        }
    }

    fn config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.symbols = vec!["HOT".into(), "CALM".into()];
        cfg.environment = "test".into();
        cfg.options.request_delay_ms = 1;
        cfg
    }

    fn market() -> Arc<StaticMarketData> {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 1.5).collect();
        let mut bars = BarsBySymbol::new();
        bars.insert("HOT".into(), bars_from("HOT", &closes));
        bars.insert("CALM".into(), bars_from("CALM", &closes));

        let mut prices = LatestPrices::new();
        prices.insert("HOT".into(), 110.0);
        prices.insert("CALM".into(), 100.0);
        Arc::new(StaticMarketData::new(bars, prices))
    }

    fn options() -> Arc<MockOptionsProvider> {
        let options = MockOptionsProvider::empty();
        options.set_mock_data(
            "HOT",
            OptionChain {
                calls: vec![OptionContract::new(105.0, 3.0), OptionContract::new(115.0, 1.0)],
                puts: Vec::new(),
            },
        );
        Arc::new(options)
    }

    #[tokio::test]
    async fn successful_run_notifies_and_persists() {
        let market = market();
        let notifier = Arc::new(RecordingNotifier::default());
        let logger = Arc::new(InMemoryRunLogger::new());

        let runner = Runner::new(config(), market.clone(), market, options())
            .with_notifier(notifier.clone())
            .with_logger(logger.clone());

        let report = runner.run_once(Some("0 14 * * 1-5")).await.unwrap();

        assert_eq!(report.summary.status, RunStatus::Success);
        assert_eq!(report.summary.tickers_checked, 2);
        assert_eq!(report.summary.bollinger_signals_found, 1);
        assert_eq!(report.summary.cron_trigger.as_deref(), Some("0 14 * * 1-5"));
        assert_eq!(report.delivery.success_count, 1);
        assert_eq!(*notifier.seen.lock(), vec!["HOT".to_string()]);

        assert_eq!(report.run_id, Some(1));
        assert_eq!(logger.runs().len(), 1);
        let signals = logger.signals();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].1.ticker, "HOT");
        assert_eq!(report.evaluation.signals[0].selected_options.len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_recorded_as_failed_run() {
        let logger = Arc::new(InMemoryRunLogger::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let runner = Runner::new(config(), Arc::new(FailingHistory), market(), options())
            .with_notifier(notifier.clone())
            .with_logger(logger.clone());

        let report = runner.run_once(None).await.unwrap();

        assert_eq!(report.summary.status, RunStatus::Failed);
        assert_eq!(report.summary.bollinger_signals_found, 0);
        assert!(notifier.seen.lock().is_empty());
        assert_eq!(logger.runs()[0].1.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn invalid_config_refuses_to_run() {
        let mut cfg = config();
        cfg.macd.fast = 30;
        let market = market();
        let runner = Runner::new(cfg, market.clone(), market, options());

        let err = runner.run_once(None).await.unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn runs_without_notifier_or_logger() {
        let market = market();
        let runner = Runner::new(config(), market.clone(), market, options());
        let report = runner.run_once(None).await.unwrap();
        assert_eq!(report.run_id, None);
        assert_eq!(report.delivery, DeliveryReport::default());
    }
}
