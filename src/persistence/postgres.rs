use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::{debug, info};

use crate::persistence::{PersistenceLogger, RunSignalRecord, RunSummary};

/// Run history in PostgreSQL.
pub struct PostgresRunLogger {
    pool: PgPool,
}

impl PostgresRunLogger {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url)
            .await
            .context("failed to connect to run history database")?;

        info!("✅ Connected to run history database");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_executions (
                id BIGSERIAL PRIMARY KEY,
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ NOT NULL,
                status VARCHAR(16) NOT NULL,
                environment VARCHAR NOT NULL,
                duration_ms BIGINT NOT NULL,
                tickers_checked BIGINT NOT NULL,
                cron_trigger VARCHAR(100),
                bollinger_signals_found BIGINT,
                rsi_signals_found BIGINT,
                macd_signals_found BIGINT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_signals (
                id BIGSERIAL PRIMARY KEY,
                run_execution_id BIGINT NOT NULL REFERENCES run_executions(id),
                ticker VARCHAR NOT NULL,
                detected_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                bollinger_signal VARCHAR(16) NOT NULL,
                current_price DOUBLE PRECISION NOT NULL,
                upper_band DOUBLE PRECISION NOT NULL,
                lower_band DOUBLE PRECISION NOT NULL,
                rsi_value DOUBLE PRECISION,
                rsi_signal VARCHAR(16),
                macd_value DOUBLE PRECISION,
                macd_signal DOUBLE PRECISION,
                macd_histogram DOUBLE PRECISION,
                macd_crossover VARCHAR(16)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("✅ Initialized run history tables");

        Ok(())
    }
}

#[async_trait]
impl PersistenceLogger for PostgresRunLogger {
    async fn log_run(&self, summary: &RunSummary) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO run_executions (
                started_at, completed_at, status, environment, duration_ms, tickers_checked,
                cron_trigger, bollinger_signals_found, rsi_signals_found, macd_signals_found
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(summary.started_at)
        .bind(summary.completed_at)
        .bind(summary.status.to_string())
        .bind(&summary.environment)
        .bind(summary.duration_ms)
        .bind(summary.tickers_checked as i64)
        .bind(&summary.cron_trigger)
        .bind(summary.bollinger_signals_found as i64)
        .bind(summary.rsi_signals_found as i64)
        .bind(summary.macd_signals_found as i64)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert run_executions row")?;

        info!(
            run_id = id,
            status = %summary.status,
            duration_ms = summary.duration_ms,
            "[RunExecution] Record inserted"
        );
        Ok(id)
    }

    async fn log_signal(&self, run_id: i64, record: &RunSignalRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO run_signals (
                run_execution_id, ticker, detected_at, bollinger_signal, current_price,
                upper_band, lower_band, rsi_value, rsi_signal,
                macd_value, macd_signal, macd_histogram, macd_crossover
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(run_id)
        .bind(&record.ticker)
        .bind(record.detected_at)
        .bind(record.bollinger_signal.as_str())
        .bind(record.current_price)
        .bind(record.upper_band)
        .bind(record.lower_band)
        .bind(record.rsi_value)
        .bind(record.rsi_signal.map(|s| s.to_string()))
        .bind(record.macd_value)
        .bind(record.macd_signal)
        .bind(record.macd_histogram)
        .bind(record.macd_crossover.map(|c| c.to_string()))
        .execute(&self.pool)
        .await
        .context("failed to insert run_signals row")?;

        debug!(run_id, ticker = %record.ticker, "[RunSignal] Record inserted");
        Ok(())
    }
}

