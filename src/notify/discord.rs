// =============================================================================
// Discord webhook notifier
// =============================================================================
//
// One embed per signal, posted sequentially with a fixed pause between posts
// to stay under the webhook rate limit. A failed post is counted and logged;
// the remaining signals are still sent.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::notify::formatter::{action_label, format_band_signal, format_macd_context, format_rsi_context};
use crate::notify::{DeliveryReport, Notifier};
use crate::signals::CompositeSignal;

/// Discord rejects embed fields with an empty value.
const EMPTY_TABLE_PLACEHOLDER: &str = "No out-of-the-money contracts";

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook_url: String,
    client: reqwest::Client,
    delay: Duration,
    threshold_pct: f64,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>, delay: Duration, threshold_pct: f64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
            delay,
            threshold_pct,
        })
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await
            .context("Discord webhook request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Discord webhook returned {}: {}", status, body);
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiscordNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordNotifier")
            .field("webhook_url", &"<redacted>")
            .field("delay", &self.delay)
            .finish()
    }
}

/// Build the `{"embeds":[{"fields":[...]}]}` body for one signal.
pub fn build_embed_payload(signal: &CompositeSignal, threshold_pct: f64) -> Value {
    let formatted = format_band_signal(signal, threshold_pct);
    let table = if formatted.options_table.is_empty() {
        EMPTY_TABLE_PLACEHOLDER.to_string()
    } else {
        formatted.options_table
    };

    let mut fields = vec![
        json!({ "name": signal.symbol, "value": action_label(signal.kind) }),
        json!({ "name": formatted.result_title, "value": formatted.result_value }),
        json!({ "name": formatted.options_table_title, "value": table }),
    ];
    if let Some(rsi) = &signal.rsi {
        fields.push(json!({ "name": "RSI", "value": format_rsi_context(rsi) }));
    }
    if let Some(macd) = &signal.macd {
        fields.push(json!({ "name": "MACD", "value": format_macd_context(macd) }));
    }

    json!({ "embeds": [ { "fields": fields } ] })
}

#[async_trait]
impl Notifier for DiscordNotifier {
    #[instrument(skip_all, name = "discord::notify", fields(signals = signals.len()))]
    async fn notify(&self, signals: &[CompositeSignal]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for signal in signals {
            let payload = build_embed_payload(signal, self.threshold_pct);
            let outcome = self.post(&payload).await;
            tokio::time::sleep(self.delay).await;

            match outcome {
                Ok(()) => report.success_count += 1,
                Err(e) => {
                    error!(symbol = %signal.symbol, error = %e, "Discord webhook request failed");
                    report.failure_count += 1;
                }
            }
        }

        info!(
            success = report.success_count,
            failure = report.failure_count,
            "[Discord] Delivery finished"
        );
        report
    }
}
