// =============================================================================
// Engine Configuration: indicator parameters and run settings
// =============================================================================
//
// Every tunable lives here. All fields carry `#[serde(default)]` so adding a
// field never breaks loading an older config file. The file is only ever
// read; environment overrides apply to the in-memory copy.
//
// `validate()` is the single place a run may be refused before any
// computation starts.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["AAPL".to_string(), "TSLA".to_string()]
}

fn default_lookback_days() -> u32 {
    60
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_bb_period() -> usize {
    20
}

fn default_bb_multiplier() -> f64 {
    2.0
}

fn default_bb_threshold_pct() -> f64 {
    1.0
}

fn default_rsi_period() -> usize {
    14
}

fn default_overbought() -> f64 {
    70.0
}

fn default_oversold() -> f64 {
    30.0
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_max_contracts() -> usize {
    10
}

fn default_options_delay_ms() -> u64 {
    300
}

fn default_notify_delay_ms() -> u64 {
    250
}

// =============================================================================
// Indicator parameters
// =============================================================================

/// Bollinger window, band width, and near-band cushion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerParams {
    #[serde(default = "default_bb_period")]
    pub period: usize,

    /// Standard deviations between the middle band and each outer band.
    #[serde(default = "default_bb_multiplier")]
    pub multiplier: f64,

    /// Cushion (percent of the band) inside which a price counts as "near".
    #[serde(default = "default_bb_threshold_pct")]
    pub threshold_pct: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: default_bb_period(),
            multiplier: default_bb_multiplier(),
            threshold_pct: default_bb_threshold_pct(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiParams {
    #[serde(default = "default_rsi_period")]
    pub period: usize,

    #[serde(default = "default_overbought")]
    pub overbought: f64,

    #[serde(default = "default_oversold")]
    pub oversold: f64,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            period: default_rsi_period(),
            overbought: default_overbought(),
            oversold: default_oversold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdParams {
    #[serde(default = "default_macd_fast")]
    pub fast: usize,

    #[serde(default = "default_macd_slow")]
    pub slow: usize,

    #[serde(default = "default_macd_signal")]
    pub signal: usize,
}

impl MacdParams {
    /// Samples needed before a MACD result is trusted.
    pub fn min_samples(&self) -> usize {
        self.slow + self.signal
    }
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: default_macd_fast(),
            slow: default_macd_slow(),
            signal: default_macd_signal(),
        }
    }
}

/// Options selection and provider pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsParams {
    /// Maximum contracts attached to one signal.
    #[serde(default = "default_max_contracts")]
    pub max_contracts: usize,

    /// Minimum delay between consecutive option-chain requests.
    #[serde(default = "default_options_delay_ms")]
    pub request_delay_ms: u64,
}

impl Default for OptionsParams {
    fn default() -> Self {
        Self {
            max_contracts: default_max_contracts(),
            request_delay_ms: default_options_delay_ms(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ticker symbols evaluated on every run.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Calendar days of daily bars requested per run.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Label written to the run log (e.g. "production").
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub bollinger: BollingerParams,

    #[serde(default)]
    pub rsi: RsiParams,

    #[serde(default)]
    pub macd: MacdParams,

    #[serde(default)]
    pub options: OptionsParams,

    /// Delay between consecutive webhook posts.
    #[serde(default = "default_notify_delay_ms")]
    pub notify_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            lookback_days: default_lookback_days(),
            environment: default_environment(),
            bollinger: BollingerParams::default(),
            rsi: RsiParams::default(),
            macd: MacdParams::default(),
            options: OptionsParams::default(),
            notify_delay_ms: default_notify_delay_ms(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            lookback_days = config.lookback_days,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Replace the symbol list from a comma-separated string, normalising
    /// case and dropping blanks.
    pub fn apply_symbol_override(&mut self, raw: &str) {
        self.symbols = raw
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    /// Apply `BAND_WATCH_SYMBOLS` and `BAND_WATCH_ENV` from `lookup`. Only the
    /// in-memory copy changes.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(syms) = lookup("BAND_WATCH_SYMBOLS") {
            self.apply_symbol_override(&syms);
        }
        if let Some(env) = lookup("BAND_WATCH_ENV") {
            self.environment = env;
        }
    }

    /// Reject settings that would make every indicator meaningless.
    pub fn validate(&self) -> EngineResult<()> {
        let fail = |msg: String| Err(EngineError::Configuration(msg));

        if self.symbols.is_empty() {
            return fail("symbol list is empty".into());
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            return fail("symbol list contains a blank entry".into());
        }
        if self.lookback_days == 0 {
            return fail("lookback_days must be positive".into());
        }

        let bb = &self.bollinger;
        if bb.period == 0 {
            return fail("bollinger.period must be positive".into());
        }
        if !bb.multiplier.is_finite() || bb.multiplier <= 0.0 {
            return fail(format!("bollinger.multiplier must be positive, got {}", bb.multiplier));
        }
        if !bb.threshold_pct.is_finite() || !(0.0..100.0).contains(&bb.threshold_pct) {
            return fail(format!(
                "bollinger.threshold_pct must be within [0, 100), got {}",
                bb.threshold_pct
            ));
        }

        let rsi = &self.rsi;
        if rsi.period < 2 {
            return fail(format!("rsi.period must be at least 2, got {}", rsi.period));
        }
        if !(0.0..=100.0).contains(&rsi.oversold)
            || !(0.0..=100.0).contains(&rsi.overbought)
            || rsi.oversold >= rsi.overbought
        {
            return fail(format!(
                "rsi thresholds must satisfy 0 <= oversold < overbought <= 100, got {} / {}",
                rsi.oversold, rsi.overbought
            ));
        }

        let macd = &self.macd;
        if macd.fast == 0 || macd.slow == 0 || macd.signal == 0 {
            return fail("macd periods must be positive".into());
        }
        if macd.fast >= macd.slow {
            return fail(format!(
                "macd.fast ({}) must be shorter than macd.slow ({})",
                macd.fast, macd.slow
            ));
        }

        if self.options.max_contracts == 0 {
            return fail("options.max_contracts must be positive".into());
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.symbols, vec!["AAPL", "TSLA"]);
        assert_eq!(cfg.lookback_days, 60);
        assert_eq!(cfg.bollinger.period, 20);
        assert!((cfg.bollinger.multiplier - 2.0).abs() < f64::EPSILON);
        assert!((cfg.bollinger.threshold_pct - 1.0).abs() < f64::EPSILON);
        assert_eq!(cfg.rsi.period, 14);
        assert_eq!(cfg.macd.min_samples(), 35);
        assert_eq!(cfg.options.max_contracts, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["NVDA"], "rsi": { "period": 7 } }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["NVDA"]);
        assert_eq!(cfg.rsi.period, 7);
        assert!((cfg.rsi.overbought - 70.0).abs() < f64::EPSILON);
        assert_eq!(cfg.macd.slow, 26);
    }

    #[test]
    fn symbol_override_normalises() {
        let mut cfg = EngineConfig::default();
        cfg.apply_symbol_override(" spy, qqq ,,");
        assert_eq!(cfg.symbols, vec!["SPY", "QQQ"]);
    }

    #[test]
    fn empty_symbols_rejected() {
        let cfg = EngineConfig {
            symbols: vec![],
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn inverted_rsi_thresholds_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.rsi.oversold = 80.0;
        assert!(matches!(cfg.validate(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn macd_fast_not_shorter_than_slow_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.macd.fast = 26;
        assert!(matches!(cfg.validate(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn negative_threshold_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.bollinger.threshold_pct = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = std::env::temp_dir().join(format!("band-watch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("band_watch.json");
        std::fs::write(&path, r#"{ "symbols": ["MSFT"], "rsi": { "period": 21 } }"#).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.symbols, vec!["MSFT".to_string()]);
        assert_eq!(loaded.rsi.period, 21);
        assert_eq!(loaded.rsi.overbought, 70.0);
        assert_eq!(loaded.macd, MacdParams::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("band-watch-missing-{}.json", uuid::Uuid::new_v4()));
        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    fn env_overrides_leave_config_file_untouched() {
        let dir = std::env::temp_dir().join(format!("band-watch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("band_watch.json");
        let on_disk = r#"{ "symbols": ["AAPL"], "environment": "production" }"#;
        std::fs::write(&path, on_disk).unwrap();

        let mut cfg = EngineConfig::load(&path).unwrap();
        cfg.apply_env_overrides(|key| match key {
            "BAND_WATCH_SYMBOLS" => Some("spy".to_string()),
            "BAND_WATCH_ENV" => Some("staging".to_string()),
            _ => None,
        });
        assert_eq!(cfg.symbols, vec!["SPY".to_string()]);
        assert_eq!(cfg.environment, "staging");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), on_disk);
        assert_eq!(EngineConfig::load(&path).unwrap().symbols, vec!["AAPL".to_string()]);
        assert!(!path.with_extension("json.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
