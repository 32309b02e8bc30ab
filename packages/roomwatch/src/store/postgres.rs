//! PostgreSQL-backed store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use super::{AttemptHandle, InvocationHandle, MonitorStore};
use crate::config::RunConfig;
use crate::scrape::ScrapeOutcome;

/// Store writing to `invocations` and `scrape_attempts`.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if this is a fresh database.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS invocations (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checkin DATE,
                checkout DATE,
                max_attempts INTEGER NOT NULL,
                interval_ms BIGINT NOT NULL,
                max_price INTEGER NOT NULL,
                use_cache BOOLEAN NOT NULL,
                use_db BOOLEAN NOT NULL,
                debug BOOLEAN NOT NULL,
                loglevel TEXT NOT NULL,
                sms_enabled BOOLEAN NOT NULL,
                email_enabled BOOLEAN NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating invocations table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scrape_attempts (
                id BIGSERIAL PRIMARY KEY,
                invocation_id BIGINT NOT NULL REFERENCES invocations(id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                hotel TEXT NOT NULL,
                available BOOLEAN NOT NULL,
                errored BOOLEAN NOT NULL,
                error_detail TEXT,
                needs_post_processing BOOLEAN NOT NULL,
                processed BOOLEAN NOT NULL DEFAULT FALSE,
                raw_content TEXT NOT NULL,
                session_state JSONB NOT NULL,
                response_chain JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating scrape_attempts table")?;

        Ok(())
    }
}

#[async_trait]
impl MonitorStore for PostgresStore {
    async fn create_invocation(&self, config: &RunConfig) -> Result<InvocationHandle> {
        let uuid = Uuid::new_v4();
        let row = sqlx::query(
            r#"
            INSERT INTO invocations
                (uuid, checkin, checkout, max_attempts, interval_ms, max_price,
                 use_cache, use_db, debug, loglevel, sms_enabled, email_enabled)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(uuid)
        .bind(config.checkin)
        .bind(config.checkout)
        .bind(config.max_attempts as i32)
        .bind(config.interval.as_millis() as i64)
        .bind(config.max_price as i32)
        .bind(config.use_cache)
        .bind(config.use_db)
        .bind(config.debug)
        .bind(&config.loglevel)
        .bind(config.sms_enabled)
        .bind(config.email_enabled)
        .fetch_one(&self.pool)
        .await
        .context("inserting invocation")?;

        let id: i64 = row.try_get("id")?;
        Ok(InvocationHandle { id, uuid })
    }

    async fn record_attempt(
        &self,
        invocation: &InvocationHandle,
        outcome: &ScrapeOutcome,
    ) -> Result<AttemptHandle> {
        let session_state = serde_json::to_value(&outcome.session_state)?;
        let response_chain = serde_json::to_value(&outcome.response_chain)?;
        let row = sqlx::query(
            r#"
            INSERT INTO scrape_attempts
                (invocation_id, hotel, available, errored, error_detail,
                 needs_post_processing, raw_content, session_state, response_chain)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(invocation.id)
        .bind(outcome.adapter_name)
        .bind(outcome.available)
        .bind(outcome.errored)
        .bind(&outcome.error_detail)
        .bind(outcome.needs_post_processing)
        .bind(&outcome.raw_content)
        .bind(session_state)
        .bind(response_chain)
        .fetch_one(&self.pool)
        .await
        .context("inserting scrape attempt")?;

        let id: i64 = row.try_get("id")?;
        Ok(AttemptHandle {
            id,
            invocation_id: invocation.id,
        })
    }

    async fn mark_processed(&self, attempt: &AttemptHandle) -> Result<()> {
        // Guarded update keeps the transition monotonic at the database too.
        sqlx::query(
            "UPDATE scrape_attempts SET processed = TRUE WHERE id = $1 AND processed = FALSE",
        )
        .bind(attempt.id)
        .execute(&self.pool)
        .await
        .context("marking attempt processed")?;
        Ok(())
    }
}
