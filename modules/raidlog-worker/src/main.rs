use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use raidlog_common::WorkerConfig;
use raidlog_engine::{Deps, EngineConfig};
use raidlog_events::PgOutbox;
use raidlog_store::{GuildStatsCache, NoopGuildStatsCache, PgGuildStatsCache, PgRecordStore};
use raidlog_worker::{RetryPolicy, Worker};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("raidlog=info".parse()?);
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Raidlog worker starting...");

    // Load config
    let config = WorkerConfig::from_env()?;
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    // Run migrations (idempotent)
    let store = PgRecordStore::new(pool.clone());
    let outbox = Arc::new(PgOutbox::new(pool.clone()));
    store.migrate().await?;
    outbox.migrate().await?;
    let guild_cache: Arc<dyn GuildStatsCache> = if config.guild_stats_cache {
        let cache = PgGuildStatsCache::new(pool.clone());
        cache.migrate().await?;
        Arc::new(cache)
    } else {
        info!("Guild stats cache disabled");
        Arc::new(NoopGuildStatsCache)
    };
    info!("Migrations complete");

    let deps = Deps::new(Arc::new(store), outbox.clone(), guild_cache).with_config(
        EngineConfig {
            require_known_account_name: config.claim_requires_known_name,
            ..EngineConfig::default()
        },
    );

    let worker = Worker::new(outbox, deps, config.consumer.clone())
        .with_batch_size(config.batch_size)
        .with_poll_interval(config.poll_interval)
        .with_retry(RetryPolicy::new(config.max_attempts, config.retry_base));

    let stats = worker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
        })
        .await;

    info!("Worker stopped. {stats}");
    Ok(())
}
