//! PgOutbox: the channel backed by a Postgres table.
//!
//! Publishing appends a row; consumers read rows in seq order after their own
//! cursor. Reads are gap-aware: a seq gap left by an in-flight insert holds the
//! read back until it commits or is old enough to be a rolled-back insert.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::warn;

use crate::channel::{EventChannel, OutboundMessage};
use crate::consumer::{DeliveredMessage, MessageSource};
use crate::message::Attributes;

/// How long a seq gap may stay open before it is treated as a rolled-back insert.
const GAP_SETTLE_SECS: i64 = 10;

// ---------------------------------------------------------------------------
// PgOutbox
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgOutbox {
    pool: PgPool,
}

impl PgOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the outbox tables. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox (
                seq         BIGSERIAL    PRIMARY KEY,
                ts          TIMESTAMPTZ  NOT NULL DEFAULT now(),
                topic       TEXT         NOT NULL,
                attributes  JSONB        NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_cursors (
                consumer    TEXT         PRIMARY KEY,
                seq         BIGINT       NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_dead (
                consumer    TEXT         NOT NULL,
                seq         BIGINT       NOT NULL,
                topic       TEXT         NOT NULL,
                attributes  JSONB        NOT NULL,
                reason      TEXT         NOT NULL,
                ts          TIMESTAMPTZ  NOT NULL DEFAULT now(),
                PRIMARY KEY (consumer, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Read messages in seq order starting from `seq_start` (inclusive).
    ///
    /// Stops at the first seq gap unless the row after the gap is older than
    /// the settle window, in which case the gap is skipped for good.
    pub async fn read_from(&self, seq_start: i64, limit: usize) -> Result<Vec<DeliveredMessage>> {
        let rows = sqlx::query_as::<_, DeliveredMessage>(
            r#"
            SELECT seq, ts, topic, attributes
            FROM outbox
            WHERE seq >= $1
            ORDER BY seq ASC
            LIMIT $2
            "#,
        )
        .bind(seq_start)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let settled_before = Utc::now() - Duration::seconds(GAP_SETTLE_SECS);
        let mut result = Vec::with_capacity(rows.len());
        let mut expected_seq = seq_start;

        for row in rows {
            if row.seq != expected_seq && row.ts > settled_before {
                // Gap: an insert below this seq may still commit.
                break;
            }
            expected_seq = row.seq + 1;
            result.push(row);
        }

        Ok(result)
    }

    /// The consumer's last acknowledged seq, or 0 if it has none.
    pub async fn cursor(&self, consumer: &str) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT seq FROM outbox_cursors WHERE consumer = $1")
            .bind(consumer)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0).unwrap_or(0))
    }

    /// The latest published seq, or 0 if the outbox is empty.
    pub async fn latest_seq(&self) -> Result<i64> {
        let row = sqlx::query_as::<_, (Option<i64>,)>("SELECT MAX(seq) FROM outbox")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0.unwrap_or(0))
    }
}

#[async_trait]
impl EventChannel for PgOutbox {
    async fn publish(&self, message: &OutboundMessage) -> Result<String> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO outbox (topic, attributes)
            VALUES ($1, $2)
            RETURNING seq
            "#,
        )
        .bind(message.topic.id())
        .bind(Json(&message.attributes))
        .fetch_one(&self.pool)
        .await?;

        let seq = row.0;

        // Best-effort PG NOTIFY. Wakes idle consumers; delivery does not depend on it.
        notify_new_message(&self.pool, seq).await;

        Ok(seq.to_string())
    }
}

#[async_trait]
impl MessageSource for PgOutbox {
    async fn next_batch(&self, consumer: &str, limit: usize) -> Result<Vec<DeliveredMessage>> {
        let cursor = self.cursor(consumer).await?;
        self.read_from(cursor + 1, limit).await
    }

    async fn acknowledge(&self, consumer: &str, seq: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_cursors (consumer, seq)
            VALUES ($1, $2)
            ON CONFLICT (consumer) DO UPDATE SET seq = GREATEST(outbox_cursors.seq, EXCLUDED.seq)
            "#,
        )
        .bind(consumer)
        .bind(seq)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn dead_letter(
        &self,
        consumer: &str,
        message: &DeliveredMessage,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_dead (consumer, seq, topic, attributes, reason)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (consumer, seq) DO UPDATE SET reason = EXCLUDED.reason, ts = now()
            "#,
        )
        .bind(consumer)
        .bind(message.seq)
        .bind(&message.topic)
        .bind(Json(&message.attributes))
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PG NOTIFY helper
// ---------------------------------------------------------------------------

async fn notify_new_message(pool: &PgPool, seq: i64) {
    let result = sqlx::query("SELECT pg_notify('outbox', $1::text)")
        .bind(seq)
        .execute(pool)
        .await;

    if let Err(e) = result {
        warn!(error = %e, seq, "PG NOTIFY failed (non-fatal)");
    }
}

// ---------------------------------------------------------------------------
// sqlx::FromRow for DeliveredMessage
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for DeliveredMessage {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let attributes: Json<Attributes> = row.try_get("attributes")?;
        Ok(DeliveredMessage {
            seq: row.try_get("seq")?,
            ts: row.try_get("ts")?,
            topic: row.try_get("topic")?,
            attributes: attributes.0,
        })
    }
}

// ---------------------------------------------------------------------------
// Test utilities
// ---------------------------------------------------------------------------

#[cfg(feature = "test-utils")]
impl PgOutbox {
    /// Read all messages (for tests). No gap handling.
    pub async fn read_all(&self) -> Result<Vec<DeliveredMessage>> {
        let rows = sqlx::query_as::<_, DeliveredMessage>(
            r#"
            SELECT seq, ts, topic, attributes
            FROM outbox
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Dead-lettered (seq, reason) pairs for a consumer (for tests).
    pub async fn dead_letters(&self, consumer: &str) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT seq, reason FROM outbox_dead WHERE consumer = $1 ORDER BY seq ASC",
        )
        .bind(consumer)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
