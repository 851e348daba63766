// =============================================================================
// Band Watch: Main Entry Point
// =============================================================================
//
// Runs one check immediately, then repeats on BAND_WATCH_INTERVAL_SECS when
// set. Without an interval the process exits after the first run. The config
// file is never written back.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use band_watch::notify::{DiscordNotifier, LogNotifier, Notifier};
use band_watch::persistence::{PersistenceLogger, PostgresRunLogger};
use band_watch::providers::{AlpacaClient, MockOptionsProvider, OptionsChainProvider, YahooOptionsProvider};
use band_watch::{EngineConfig, Runner};

const CONFIG_PATH: &str = "band_watch.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Band Watch — Starting Up                          ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = EngineConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate().context("invalid engine configuration")?;

    info!(symbols = ?config.symbols, environment = %config.environment, "Configured tickers");

    // ── 2. Market data & options providers ───────────────────────────────
    let api_key = std::env::var("ALPACA_API_KEY").unwrap_or_default();
    let api_secret = std::env::var("ALPACA_API_SECRET").unwrap_or_default();
    let alpaca = Arc::new(AlpacaClient::new(api_key, api_secret)?);

    let options: Arc<dyn OptionsChainProvider> =
        match std::env::var("BAND_WATCH_OPTIONS_PROVIDER").as_deref() {
            Ok("mock") => {
                warn!("Using mock options provider");
                Arc::new(MockOptionsProvider::new())
            }
            _ => Arc::new(YahooOptionsProvider::new()?),
        };

    // ── 3. Notification & persistence ────────────────────────────────────
    let notifier: Arc<dyn Notifier> = match std::env::var("DISCORD_WEBHOOK_URL") {
        Ok(url) if !url.trim().is_empty() => Arc::new(DiscordNotifier::new(
            url,
            Duration::from_millis(config.notify_delay_ms),
            config.bollinger.threshold_pct,
        )?),
        _ => {
            warn!("DISCORD_WEBHOOK_URL not set — signals will only be logged");
            Arc::new(LogNotifier::new(config.bollinger.threshold_pct))
        }
    };

    let mut runner = Runner::new(config, alpaca.clone(), alpaca, options).with_notifier(notifier);

    if let Ok(url) = std::env::var("DATABASE_URL") {
        match PostgresRunLogger::connect(&url).await {
            Ok(logger) => match logger.init_tables().await {
                Ok(()) => {
                    let logger: Arc<dyn PersistenceLogger> = Arc::new(logger);
                    runner = runner.with_logger(logger);
                }
                Err(e) => error!(error = %e, "Failed to initialise run history tables — persistence disabled"),
            },
            Err(e) => error!(error = %e, "Run history database unavailable — persistence disabled"),
        }
    }

    // ── 4. Schedule ──────────────────────────────────────────────────────
    let interval_secs = std::env::var("BAND_WATCH_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    if interval_secs == 0 {
        let report = runner.run_once(Some("manual")).await?;
        info!(status = %report.summary.status, "Single run complete");
        return Ok(());
    }

    let trigger = format!("every {interval_secs}s");
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    info!(interval_secs, "Scheduler running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = runner.run_once(Some(&trigger)).await {
                    error!(error = %e, "Run refused");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutdown signal received — stopping gracefully");
                break;
            }
        }
    }

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    info!("Band Watch shut down complete.");
    Ok(())
}
