// =============================================================================
// Signal Aggregator: indicators + triggers + option chains → composite signals
// =============================================================================
//
// Pipeline for one run:
//   1. Validate configuration (the only step allowed to refuse the run)
//   2. Compute Bollinger, RSI and MACD for every symbol (pure, per-call state)
//   3. Classify each symbol against its bands
//   4. For triggered symbols only, fetch the option chain through the pacer
//      and select out-of-the-money contracts
//   5. Attach RSI / MACD context by symbol key
//
// A failing option-chain fetch drops that symbol's signal and nothing else.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::indicators::{
    evaluate_bollinger_bands, evaluate_macd_signals, evaluate_rsi_signals, BarsBySymbol,
    BollingerBandResult, MacdResult, RsiResult,
};
use crate::providers::{OptionsChainProvider, RequestPacer};
use crate::signals::evaluator::{evaluate_band_triggers, BandTrigger};
use crate::signals::options_filter::select_options;
use crate::types::{BandSignalKind, Crossover, LatestPrices, OptionContract, RsiSignal};

/// Symbol-level output: a band trigger with its selected contracts and any
/// RSI / MACD context computed for the same symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSignal {
    pub symbol: String,
    pub kind: BandSignalKind,
    pub current_price: f64,
    pub upper_band: f64,
    pub middle_band: f64,
    pub lower_band: f64,
    pub selected_options: Vec<OptionContract>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<RsiResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdResult>,
}

/// Everything one evaluation produced.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub signals: Vec<CompositeSignal>,
    pub bollinger: BTreeMap<String, BollingerBandResult>,
    pub rsi: BTreeMap<String, RsiResult>,
    pub macd: BTreeMap<String, MacdResult>,
    /// Symbols whose option chain could not be fetched.
    pub provider_failures: Vec<String>,
}

impl Evaluation {
    pub fn bollinger_signals_found(&self) -> usize {
        self.signals.len()
    }

    pub fn rsi_signals_found(&self) -> usize {
        self.rsi.values().filter(|r| r.signal != RsiSignal::Neutral).count()
    }

    pub fn macd_signals_found(&self) -> usize {
        self.macd.values().filter(|m| m.crossover != Crossover::Neutral).count()
    }
}

pub struct SignalAggregator {
    config: EngineConfig,
    options: Arc<dyn OptionsChainProvider>,
    pacer: RequestPacer,
}

impl SignalAggregator {
    pub fn new(config: EngineConfig, options: Arc<dyn OptionsChainProvider>) -> Self {
        let pacer = RequestPacer::from_millis(config.options.request_delay_ms);
        Self {
            config,
            options,
            pacer,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    /// Evaluate `bars` against `latest_prices`.
    ///
    /// Only a configuration error is returned as `Err`; every per-symbol
    /// problem is logged and reflected as a missing entry.
    pub async fn evaluate(&self, bars: &BarsBySymbol, latest_prices: &LatestPrices) -> EngineResult<Evaluation> {
        self.config.validate()?;

        let bollinger = evaluate_bollinger_bands(bars, &self.config.bollinger);
        let rsi = evaluate_rsi_signals(bars, &self.config.rsi);
        let macd = evaluate_macd_signals(bars, &self.config.macd);

        let triggers = evaluate_band_triggers(&bollinger, latest_prices, self.config.bollinger.threshold_pct);

        let mut signals = Vec::with_capacity(triggers.len());
        let mut provider_failures = Vec::new();

        for trigger in triggers {
            match self.build_signal(&trigger, &rsi, &macd).await {
                Ok(signal) => signals.push(signal),
                Err(e) => {
                    error!(symbol = %trigger.symbol, error = %e, "[SignalAggregator] Dropping signal");
                    provider_failures.push(trigger.symbol);
                }
            }
        }

        info!(
            symbols = bars.len(),
            signals = signals.len(),
            failures = provider_failures.len(),
            "[SignalAggregator] Evaluation complete"
        );

        Ok(Evaluation {
            signals,
            bollinger,
            rsi,
            macd,
            provider_failures,
        })
    }

    async fn build_signal(
        &self,
        trigger: &BandTrigger,
        rsi: &BTreeMap<String, RsiResult>,
        macd: &BTreeMap<String, MacdResult>,
    ) -> EngineResult<CompositeSignal> {
        self.pacer.acquire().await;

        let chain = self
            .options
            .get_latest_option_chain(&trigger.symbol)
            .await
            .map_err(|e| EngineError::provider(trigger.symbol.clone(), e))?;

        let selected_options = select_options(
            trigger.kind,
            &chain,
            trigger.current_price,
            self.config.options.max_contracts,
        );

        Ok(CompositeSignal {
            symbol: trigger.symbol.clone(),
            kind: trigger.kind,
            current_price: trigger.current_price,
            upper_band: trigger.bands.upper,
            middle_band: trigger.bands.middle,
            lower_band: trigger.bands.lower,
            selected_options,
            rsi: rsi.get(&trigger.symbol).cloned(),
            macd: macd.get(&trigger.symbol).cloned(),
        })
    }
}
