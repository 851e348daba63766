// =============================================================================
// Alpaca Market Data REST client: daily bars and latest trades
// =============================================================================
//
// SECURITY: the key pair is sent as APCA-API-KEY-ID / APCA-API-SECRET-KEY
// headers and never logged or serialised.
//
// Bars are requested with timeframe=1Day starting `lookback_days` ago and the
// response is paged through `next_page_token` until exhausted.
// =============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::indicators::BarsBySymbol;
use crate::providers::{LatestPriceProvider, PriceHistoryProvider};
use crate::types::{Bar, LatestPrices};

const DEFAULT_BASE_URL: &str = "https://data.alpaca.markets";

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BarsPage {
    #[serde(default)]
    bars: Option<HashMap<String, Vec<WireBar>>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireBar {
    /// RFC 3339 bar timestamp.
    t: String,
    /// Close price.
    c: f64,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(rename = "latestTrade")]
    latest_trade: Option<LatestTrade>,
}

#[derive(Debug, Deserialize)]
struct LatestTrade {
    p: f64,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// Alpaca market-data client. Implements both bar-history and latest-price
/// collaborator traits.
#[derive(Clone)]
pub struct AlpacaClient {
    base_url: String,
    client: reqwest::Client,
}

impl AlpacaClient {
    /// Create a new `AlpacaClient` against the production data endpoint.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, api_secret, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "APCA-API-KEY-ID",
            HeaderValue::from_str(&api_key.into()).context("invalid Alpaca API key header")?,
        );
        default_headers.insert(
            "APCA-API-SECRET-KEY",
            HeaderValue::from_str(&api_secret.into()).context("invalid Alpaca API secret header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into();
        debug!(base_url = %base_url, "AlpacaClient initialised");

        Ok(Self { base_url, client })
    }

    /// GET /v2/stocks/bars, following every page.
    #[instrument(skip(self), name = "alpaca::get_bars")]
    pub async fn fetch_bars(&self, symbols: &[String], lookback_days: u32) -> Result<BarsBySymbol> {
        let start = (Utc::now() - Duration::days(i64::from(lookback_days)))
            .format("%Y-%m-%d")
            .to_string();
        let symbols_query = symbols.join(",");
        let url = format!("{}/v2/stocks/bars", self.base_url);

        let mut result: BarsBySymbol = symbols.iter().map(|s| (s.clone(), Vec::new())).collect();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("symbols", symbols_query.clone()),
                ("timeframe", "1Day".to_string()),
                ("start", start.clone()),
            ];
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }

            let resp = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await
                .context("GET /v2/stocks/bars request failed")?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Alpaca GET /v2/stocks/bars returned {}: {}", status, body);
            }

            let page: BarsPage = resp.json().await.context("failed to parse bars response")?;
            page_token = merge_bars_page(&mut result, page)?;

            if page_token.is_none() {
                break;
            }
        }

        for series in result.values_mut() {
            series.sort_by_key(|b| b.timestamp);
        }

        debug!(
            symbols = symbols.len(),
            bars = result.values().map(Vec::len).sum::<usize>(),
            "bars fetched"
        );
        Ok(result)
    }

    /// GET /v2/stocks/snapshots: latest trade price per symbol.
    #[instrument(skip(self), name = "alpaca::get_latest_prices")]
    pub async fn fetch_latest_prices(&self, symbols: &[String]) -> Result<LatestPrices> {
        let url = format!("{}/v2/stocks/snapshots", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await
            .context("GET /v2/stocks/snapshots request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Alpaca GET /v2/stocks/snapshots returned {}: {}", status, body);
        }

        let snapshots: HashMap<String, Snapshot> = resp
            .json()
            .await
            .context("failed to parse snapshots response")?;

        Ok(extract_latest_prices(symbols, snapshots))
    }
}

#[async_trait]
impl PriceHistoryProvider for AlpacaClient {
    async fn get_bars(&self, symbols: &[String], lookback_days: u32) -> Result<BarsBySymbol> {
        self.fetch_bars(symbols, lookback_days).await
    }
}

#[async_trait]
impl LatestPriceProvider for AlpacaClient {
    async fn get_latest_prices(&self, symbols: &[String]) -> Result<LatestPrices> {
        self.fetch_latest_prices(symbols).await
    }
}

impl std::fmt::Debug for AlpacaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlpacaClient")
            .field("credentials", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Internal helpers
// -----------------------------------------------------------------------------

/// Append one page of bars to `result` and return the next page token.
fn merge_bars_page(result: &mut BarsBySymbol, page: BarsPage) -> Result<Option<String>> {
    for (symbol, bars) in page.bars.unwrap_or_default() {
        let series = result.entry(symbol.clone()).or_default();
        for bar in bars {
            let timestamp = parse_bar_date(&bar.t)?;
            series.push(Bar::new(symbol.clone(), timestamp, bar.c));
        }
    }

    Ok(page.next_page_token.filter(|t| !t.is_empty()))
}

fn parse_bar_date(raw: &str) -> Result<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .with_context(|| format!("failed to parse bar timestamp '{raw}'"))
}

fn extract_latest_prices(symbols: &[String], mut snapshots: HashMap<String, Snapshot>) -> LatestPrices {
    let mut prices = LatestPrices::new();
    for symbol in symbols {
        match snapshots.remove(symbol).and_then(|s| s.latest_trade) {
            Some(trade) => {
                prices.insert(symbol.clone(), trade.p);
            }
            None => warn!(symbol = %symbol, "no latest trade in snapshot — symbol skipped"),
        }
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_bars_page_appends_and_returns_token() {
        let json = r#"{
            "bars": {
                "AAPL": [
                    { "t": "2024-01-02T05:00:00Z", "o": 1, "h": 1, "l": 1, "c": 185.64, "v": 10 },
                    { "t": "2024-01-03T05:00:00Z", "o": 1, "h": 1, "l": 1, "c": 184.25, "v": 10 }
                ]
            },
            "next_page_token": "abc"
        }"#;
        let page: BarsPage = serde_json::from_str(json).unwrap();

        let mut result: BarsBySymbol = [("AAPL".to_string(), Vec::new()), ("TSLA".to_string(), Vec::new())]
            .into_iter()
            .collect();
        let token = merge_bars_page(&mut result, page).unwrap();

        assert_eq!(token.as_deref(), Some("abc"));
        assert_eq!(result["AAPL"].len(), 2);
        assert_eq!(result["AAPL"][0].timestamp, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!((result["AAPL"][1].close_price - 184.25).abs() < 1e-12);
        assert!(result["TSLA"].is_empty());
    }

    #[test]
    fn merge_bars_page_last_page_has_no_token() {
        let page: BarsPage = serde_json::from_str(r#"{ "bars": null, "next_page_token": null }"#).unwrap();
        let mut result = BarsBySymbol::new();
        assert_eq!(merge_bars_page(&mut result, page).unwrap(), None);
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let page: BarsPage =
            serde_json::from_str(r#"{ "bars": { "X": [ { "t": "yesterday", "c": 1.0 } ] } }"#).unwrap();
        let mut result = BarsBySymbol::new();
        assert!(merge_bars_page(&mut result, page).is_err());
    }

    #[test]
    fn latest_prices_skip_missing_trades() {
        let json = r#"{
            "AAPL": { "latestTrade": { "p": 190.5, "s": 100, "t": "2024-01-02T15:00:00Z", "x": "V", "c": [] } },
            "TSLA": { "latestTrade": null }
        }"#;
        let snapshots: HashMap<String, Snapshot> = serde_json::from_str(json).unwrap();
        let symbols = vec!["AAPL".to_string(), "TSLA".to_string(), "MSFT".to_string()];

        let prices = extract_latest_prices(&symbols, snapshots);
        assert_eq!(prices.len(), 1);
        assert!((prices["AAPL"] - 190.5).abs() < 1e-12);
    }

    #[test]
    fn debug_redacts_credentials() {
        let client = AlpacaClient::new("key-id", "super-secret").unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
