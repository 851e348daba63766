// =============================================================================
// Yahoo Finance options provider
// =============================================================================
//
// GET /v7/finance/options/{symbol} returns one block per expiry; only the
// first (nearest) expiry is used. An empty result is a provider error.
//
// Session handshake: GET fc.yahoo.com seeds the cookie jar, then
// GET /v1/test/getcrumb yields the crumb sent as `crumb=` on every query.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::providers::OptionsChainProvider;
use crate::types::{OptionChain, OptionContract};

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; band-watch/1.0)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    option_chain: OptionChainEnvelope,
}

#[derive(Debug, Deserialize)]
struct OptionChainEnvelope {
    #[serde(default)]
    result: Vec<OptionChainResult>,
}

#[derive(Debug, Deserialize)]
struct OptionChainResult {
    #[serde(default)]
    options: Vec<ExpiryBlock>,
}

#[derive(Debug, Deserialize)]
struct ExpiryBlock {
    #[serde(default)]
    calls: Vec<YahooContract>,
    #[serde(default)]
    puts: Vec<YahooContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooContract {
    strike: f64,
    #[serde(default)]
    last_price: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    implied_volatility: Option<f64>,
}

impl From<YahooContract> for OptionContract {
    fn from(c: YahooContract) -> Self {
        Self {
            strike: c.strike,
            last_price: c.last_price,
            bid: c.bid,
            ask: c.ask,
            implied_volatility: c.implied_volatility,
        }
    }
}

/// Live options provider backed by the Yahoo Finance quote API.
///
/// The quote API rejects requests without a session cookie and the matching
/// crumb. The crumb is fetched lazily, cached, and refreshed once when the
/// API answers 401.
#[derive(Debug)]
pub struct YahooOptionsProvider {
    base_url: String,
    cookie_url: String,
    client: reqwest::Client,
    crumb: Mutex<Option<String>>,
}

impl YahooOptionsProvider {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::with_urls(base_url, DEFAULT_COOKIE_URL)
    }

    pub fn with_urls(base_url: impl Into<String>, cookie_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            base_url: base_url.into(),
            cookie_url: cookie_url.into(),
            client,
            crumb: Mutex::new(None),
        })
    }

    /// Cached crumb, or a fresh one after seeding the session cookie.
    async fn crumb(&self, refresh: bool) -> Result<String> {
        let mut cached = self.crumb.lock().await;
        if !refresh {
            if let Some(crumb) = cached.as_ref() {
                return Ok(crumb.clone());
            }
        }

        // The cookie host answers 404 but still sets the session cookie.
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            warn!(error = %e, "[YahooOptionsProvider] Cookie seed request failed");
        }

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /v1/test/getcrumb request failed")?;

        let status = resp.status();
        let body = resp.text().await.context("failed to read crumb response")?;
        if !status.is_success() {
            anyhow::bail!("Yahoo GET /v1/test/getcrumb returned {}: {}", status, body);
        }

        let crumb = body.trim().to_string();
        if crumb.is_empty() {
            anyhow::bail!("Yahoo returned an empty crumb");
        }

        debug!(refresh, "[YahooOptionsProvider] Obtained crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn request_chain(&self, symbol: &str, crumb: &str) -> Result<reqwest::Response> {
        let url = format!("{}/v7/finance/options/{}", self.base_url, symbol);

        self.client
            .get(&url)
            .query(&options_query(crumb))
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))
    }

    async fn fetch_chain(&self, symbol: &str) -> Result<OptionChain> {
        let crumb = self.crumb(false).await?;
        let mut resp = self.request_chain(symbol, &crumb).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(symbol, "[YahooOptionsProvider] Crumb rejected, refreshing");
            let crumb = self.crumb(true).await?;
            resp = self.request_chain(symbol, &crumb).await?;
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Yahoo GET /v7/finance/options/{} returned {}: {}", symbol, status, body);
        }

        let body: OptionsResponse = resp
            .json()
            .await
            .context("failed to parse options response")?;

        first_expiry(symbol, body)
    }
}

fn options_query(crumb: &str) -> [(&'static str, String); 4] {
    [
        ("lang", "en-US".to_string()),
        ("region", "US".to_string()),
        ("formatted", "false".to_string()),
        ("crumb", crumb.to_string()),
    ]
}

#[async_trait]
impl OptionsChainProvider for YahooOptionsProvider {
    #[instrument(skip(self), name = "yahoo::get_latest_option_chain")]
    async fn get_latest_option_chain(&self, symbol: &str) -> Result<OptionChain> {
        info!(symbol, "[YahooOptionsProvider] Fetching options chain");

        match self.fetch_chain(symbol).await {
            Ok(chain) => {
                info!(
                    symbol,
                    calls = chain.calls.len(),
                    puts = chain.puts.len(),
                    "[YahooOptionsProvider] Fetched options chain"
                );
                Ok(chain)
            }
            Err(e) => {
                error!(symbol, error = %e, "[YahooOptionsProvider] Error fetching options chain");
                Err(e.context(format!("Failed to fetch options chain for {symbol}")))
            }
        }
    }
}

fn first_expiry(symbol: &str, body: OptionsResponse) -> Result<OptionChain> {
    let block = body
        .option_chain
        .result
        .into_iter()
        .next()
        .and_then(|r| r.options.into_iter().next())
        .with_context(|| format!("No options chain found for symbol: {symbol}"))?;

    debug!(symbol, "using nearest expiry");
    Ok(OptionChain {
        calls: block.calls.into_iter().map(OptionContract::from).collect(),
        puts: block.puts.into_iter().map(OptionContract::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::test_http::{Reply, TestServer};

    #[test]
    fn first_expiry_maps_contracts() {
        let json = r#"{
            "optionChain": {
                "result": [{
                    "underlyingSymbol": "AAPL",
                    "options": [
                        {
                            "expirationDate": 1700000000,
                            "calls": [
                                { "contractSymbol": "AAPL1", "strike": 190.0, "lastPrice": 2.5, "bid": 2.4, "ask": 2.6, "impliedVolatility": 0.25 },
                                { "contractSymbol": "AAPL2", "strike": 195.0, "lastPrice": 1.1 }
                            ],
                            "puts": [
                                { "contractSymbol": "AAPL3", "strike": 180.0, "lastPrice": 1.8, "bid": 1.7 }
                            ]
                        },
                        { "expirationDate": 1700600000, "calls": [], "puts": [] }
                    ]
                }],
                "error": null
            }
        }"#;
        let body: OptionsResponse = serde_json::from_str(json).unwrap();
        let chain = first_expiry("AAPL", body).unwrap();

        assert_eq!(chain.calls.len(), 2);
        assert_eq!(chain.calls[1], OptionContract::new(195.0, 1.1));
        assert_eq!(chain.puts[0].bid, Some(1.7));
        assert_eq!(chain.puts[0].ask, None);
    }

    #[test]
    fn empty_result_is_an_error() {
        let body: OptionsResponse =
            serde_json::from_str(r#"{ "optionChain": { "result": [], "error": null } }"#).unwrap();
        let err = first_expiry("NOPE", body).unwrap_err();
        assert!(err.to_string().contains("No options chain found for symbol: NOPE"));
    }

    #[test]
    fn no_expiries_is_an_error() {
        let body: OptionsResponse =
            serde_json::from_str(r#"{ "optionChain": { "result": [{ "options": [] }] } }"#).unwrap();
        assert!(first_expiry("X", body).is_err());
    }

    const CHAIN_JSON: &str = r#"{"optionChain":{"result":[{"options":[{"calls":[{"strike":200.0,"lastPrice":1.5}],"puts":[]}]}],"error":null}}"#;

    fn request_line(head: &str) -> &str {
        head.lines().next().unwrap_or_default()
    }

    #[test]
    fn options_query_carries_crumb() {
        let query = options_query("abc/def");
        assert!(query.contains(&("crumb", "abc/def".to_string())));
        assert!(query.contains(&("formatted", "false".to_string())));
        assert_eq!(query.len(), 4);
    }

    #[tokio::test]
    async fn handshake_seeds_cookie_and_caches_crumb() {
        let server = TestServer::spawn(|head| {
            let line = request_line(head);
            if line.contains(" /seed ") {
                Reply::new(404, "").with_header("set-cookie", "A3=session; Path=/")
            } else if line.contains("/v1/test/getcrumb") {
                Reply::new(200, "crumb-one")
            } else {
                Reply::new(200, CHAIN_JSON)
            }
        })
        .await;
        let provider =
            YahooOptionsProvider::with_urls(&server.base_url, format!("{}/seed", server.base_url)).unwrap();

        let chain = provider.get_latest_option_chain("AAPL").await.unwrap();
        assert_eq!(chain.calls[0].strike, 200.0);
        provider.get_latest_option_chain("AAPL").await.unwrap();

        assert_eq!(server.count_path("/v1/test/getcrumb"), 1);
        assert_eq!(server.count_path("/v7/finance/options/aapl"), 2);

        let requests = server.requests();
        let crumb_request = requests.iter().find(|r| r.contains("/v1/test/getcrumb")).unwrap();
        assert!(crumb_request.contains("a3=session"));
        let options_request = requests.iter().find(|r| r.contains("/v7/finance/options/")).unwrap();
        assert!(options_request.contains("crumb=crumb-one"));
    }

    #[tokio::test]
    async fn rejected_crumb_is_refreshed_once() {
        let issued = Arc::new(AtomicUsize::new(0));
        let counter = issued.clone();
        let server = TestServer::spawn(move |head| {
            let line = request_line(head);
            if line.contains("/v1/test/getcrumb") {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Reply::new(200, "stale"),
                    _ => Reply::new(200, "fresh"),
                }
            } else if line.contains("/v7/finance/options/") {
                if line.contains("crumb=fresh") {
                    Reply::new(200, CHAIN_JSON)
                } else {
                    Reply::new(401, r#"{"finance":{"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#)
                }
            } else {
                Reply::new(404, "")
            }
        })
        .await;
        let provider =
            YahooOptionsProvider::with_urls(&server.base_url, format!("{}/seed", server.base_url)).unwrap();

        let chain = provider.get_latest_option_chain("TSLA").await.unwrap();
        assert_eq!(chain.calls.len(), 1);
        assert_eq!(issued.load(Ordering::SeqCst), 2);
        assert_eq!(server.count_path("/v7/finance/options/tsla"), 2);
    }

    #[tokio::test]
    async fn persistent_unauthorized_fails_after_one_refresh() {
        let server = TestServer::spawn(|head| {
            if request_line(head).contains("/v1/test/getcrumb") {
                Reply::new(200, "crumb")
            } else if request_line(head).contains("/v7/finance/options/") {
                Reply::new(401, "Invalid Crumb")
            } else {
                Reply::new(404, "")
            }
        })
        .await;
        let provider =
            YahooOptionsProvider::with_urls(&server.base_url, format!("{}/seed", server.base_url)).unwrap();

        let err = provider.get_latest_option_chain("MSFT").await.unwrap_err();
        assert!(format!("{err:#}").contains("401"));
        assert_eq!(server.count_path("/v1/test/getcrumb"), 2);
        assert_eq!(server.count_path("/v7/finance/options/msft"), 2);
    }
}
