//! Guild statistics cache invalidation.
//!
//! Guild stats pages are rendered from claimed reports. When a report gains
//! an account claim the cached page for its guild is stale and is deleted;
//! the next request re-renders it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use raidlog_common::GuildId;

#[async_trait]
pub trait GuildStatsCache: Send + Sync {
    /// Drop the cached stats for `guild_id`. Absent entries are not an error.
    async fn invalidate(&self, guild_id: GuildId) -> Result<()>;
}

// ---------------------------------------------------------------------------
// NoopGuildStatsCache
// ---------------------------------------------------------------------------

/// For deployments without a stats cache.
pub struct NoopGuildStatsCache;

#[async_trait]
impl GuildStatsCache for NoopGuildStatsCache {
    async fn invalidate(&self, _guild_id: GuildId) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PgGuildStatsCache
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgGuildStatsCache {
    pool: PgPool,
}

impl PgGuildStatsCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the cache table. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_stats (
                guild_id    INTEGER      PRIMARY KEY,
                guild_name  TEXT         NOT NULL DEFAULT '',
                rendered    BYTEA        NOT NULL,
                created_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GuildStatsCache for PgGuildStatsCache {
    async fn invalidate(&self, guild_id: GuildId) -> Result<()> {
        let result = sqlx::query("DELETE FROM guild_stats WHERE guild_id = $1")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        debug!(guild_id, deleted = result.rows_affected(), "Invalidated guild stats");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingGuildStatsCache
// ---------------------------------------------------------------------------

/// Records invalidations in order. Used by tests.
#[derive(Default)]
pub struct RecordingGuildStatsCache {
    invalidated: Mutex<Vec<GuildId>>,
    fail_next: AtomicUsize,
}

impl RecordingGuildStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` invalidations fail.
    pub fn fail_next_invalidations(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn invalidated(&self) -> Vec<GuildId> {
        self.invalidated
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl GuildStatsCache for RecordingGuildStatsCache {
    async fn invalidate(&self, guild_id: GuildId) -> Result<()> {
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("RecordingGuildStatsCache: injected failure for guild {guild_id}");
        }
        self.invalidated
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(guild_id);
        Ok(())
    }
}
