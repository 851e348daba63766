// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// InsufficientData, NonFinite and ProviderFailure are recovered at the symbol
// boundary by the batch operations; only Configuration stops a run before it
// starts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient data for {indicator}: need at least {required} data points, got {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("{indicator} produced a non-finite value")]
    NonFinite { indicator: &'static str },

    #[error("provider failure for {symbol}: {source}")]
    ProviderFailure {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn insufficient(indicator: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            indicator,
            required,
            available,
        }
    }

    pub fn provider(symbol: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ProviderFailure {
            symbol: symbol.into(),
            source,
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_reports_shortfall() {
        let e = EngineError::insufficient("RSI", 14, 10);
        assert_eq!(
            e.to_string(),
            "insufficient data for RSI: need at least 14 data points, got 10"
        );
    }

    #[test]
    fn provider_failure_keeps_cause() {
        let e = EngineError::provider("TSLA", anyhow::anyhow!("HTTP 404"));
        assert!(e.to_string().contains("TSLA"));
        assert!(e.to_string().contains("HTTP 404"));
    }
}
