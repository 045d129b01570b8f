//! PgRecordStore: player and report aggregates as JSONB rows.
//!
//! A transaction takes a transaction-scoped advisory lock on its key before
//! reading, so concurrent read-modify-writes of one aggregate serialize and
//! a never-written key is covered too.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use raidlog_common::{CharacterId, PlayerRecord, ReportRecord};

use crate::traits::{RecordStore, RecordTx};

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the record tables. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id          BIGINT       PRIMARY KEY,
                name        TEXT         NOT NULL,
                record      JSONB        NOT NULL,
                updated_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS players_name_idx ON players (name)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                code        TEXT         PRIMARY KEY,
                record      JSONB        NOT NULL,
                updated_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

async fn upsert_player<'e, E>(executor: E, id: CharacterId, player: &PlayerRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO players (id, name, record)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, record = EXCLUDED.record, updated_at = now()
        "#,
    )
    .bind(id)
    .bind(&player.name)
    .bind(Json(player))
    .execute(executor)
    .await?;
    Ok(())
}

async fn upsert_report<'e, E>(executor: E, code: &str, report: &ReportRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO reports (code, record)
        VALUES ($1, $2)
        ON CONFLICT (code) DO UPDATE
            SET record = EXCLUDED.record, updated_at = now()
        "#,
    )
    .bind(code)
    .bind(Json(report))
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_report(&self, code: &str) -> Result<Option<ReportRecord>> {
        let row = sqlx::query_as::<_, (Json<ReportRecord>,)>(
            "SELECT record FROM reports WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0 .0))
    }

    async fn put_report(&self, code: &str, report: &ReportRecord) -> Result<()> {
        upsert_report(&self.pool, code, report).await
    }

    async fn get_player(&self, id: CharacterId) -> Result<Option<PlayerRecord>> {
        let row = sqlx::query_as::<_, (Json<PlayerRecord>,)>(
            "SELECT record FROM players WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0 .0))
    }

    async fn put_player(&self, id: CharacterId, player: &PlayerRecord) -> Result<()> {
        upsert_player(&self.pool, id, player).await
    }

    async fn begin_player(&self, id: CharacterId) -> Result<Box<dyn RecordTx<PlayerRecord>>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPlayerTx { tx: Some(tx), id }))
    }

    async fn begin_report(&self, code: &str) -> Result<Box<dyn RecordTx<ReportRecord>>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgReportTx {
            tx: Some(tx),
            code: code.to_string(),
        }))
    }

    async fn count_players_named(&self, name: &str) -> Result<u64> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM players WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0.max(0) as u64)
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

fn finished() -> anyhow::Error {
    anyhow!("PgRecordStore: transaction already finished")
}

struct PgPlayerTx {
    tx: Option<Transaction<'static, Postgres>>,
    id: CharacterId,
}

#[async_trait]
impl RecordTx<PlayerRecord> for PgPlayerTx {
    async fn get(&mut self) -> Result<Option<PlayerRecord>> {
        let tx = self.tx.as_mut().ok_or_else(finished)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(self.id)
            .execute(&mut **tx)
            .await?;

        let row = sqlx::query_as::<_, (Json<PlayerRecord>,)>(
            "SELECT record FROM players WHERE id = $1 FOR UPDATE",
        )
        .bind(self.id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|r| r.0 .0))
    }

    async fn commit(&mut self, record: &PlayerRecord) -> Result<()> {
        let mut tx = self.tx.take().ok_or_else(finished)?;
        upsert_player(&mut *tx, self.id, record).await?;
        tx.commit().await?;
        debug!(player_id = self.id, "Committed player record");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

struct PgReportTx {
    tx: Option<Transaction<'static, Postgres>>,
    code: String,
}

#[async_trait]
impl RecordTx<ReportRecord> for PgReportTx {
    async fn get(&mut self) -> Result<Option<ReportRecord>> {
        let tx = self.tx.as_mut().ok_or_else(finished)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(&self.code)
            .execute(&mut **tx)
            .await?;

        let row = sqlx::query_as::<_, (Json<ReportRecord>,)>(
            "SELECT record FROM reports WHERE code = $1 FOR UPDATE",
        )
        .bind(&self.code)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|r| r.0 .0))
    }

    async fn commit(&mut self, record: &ReportRecord) -> Result<()> {
        let mut tx = self.tx.take().ok_or_else(finished)?;
        upsert_report(&mut *tx, &self.code, record).await?;
        tx.commit().await?;
        debug!(code = %self.code, "Committed report record");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
