// =============================================================================
// Notification Module
// =============================================================================
//
// Delivery of composite signals to humans. The run only needs a count of
// what got through; a failed delivery is never an error for the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::signals::CompositeSignal;

pub mod discord;
pub mod formatter;

pub use discord::DiscordNotifier;
pub use formatter::{format_band_signal, FormattedBandSignal};

/// Outcome of delivering a batch of signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub success_count: usize,
    pub failure_count: usize,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, signals: &[CompositeSignal]) -> DeliveryReport;
}

/// Writes each signal to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    threshold_pct: f64,
}

impl LogNotifier {
    pub fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, signals: &[CompositeSignal]) -> DeliveryReport {
        for signal in signals {
            let formatted = format_band_signal(signal, self.threshold_pct);
            info!(
                symbol = %signal.symbol,
                kind = %signal.kind,
                result = %formatted.result_title,
                contracts = signal.selected_options.len(),
                "[LogNotifier] {}",
                formatted.result_value.replace('\n', "|")
            );
        }
        DeliveryReport {
            success_count: signals.len(),
            failure_count: 0,
        }
    }
}
