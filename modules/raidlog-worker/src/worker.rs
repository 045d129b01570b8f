//! The consume loop.
//!
//! Read a batch after the consumer's cursor → route each message → retry
//! retryable failures with backoff → dead-letter the rest → acknowledge.
//! A message is acknowledged only after it succeeded or was dead-lettered,
//! so a crash mid-batch redelivers from the last acknowledged seq.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use raidlog_engine::{route, Deps, Outcome};
use raidlog_events::{DeliveredMessage, MessageSource};

use crate::retry::RetryPolicy;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub handled: usize,
    pub skipped: usize,
    pub retries: usize,
    pub dead_lettered: usize,
}

impl fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handled={} skipped={} retries={} dead_lettered={}",
            self.handled, self.skipped, self.retries, self.dead_lettered
        )
    }
}

pub struct Worker {
    source: Arc<dyn MessageSource>,
    deps: Deps,
    consumer: String,
    batch_size: usize,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl Worker {
    pub fn new(source: Arc<dyn MessageSource>, deps: Deps, consumer: impl Into<String>) -> Self {
        Self {
            source,
            deps,
            consumer: consumer.into(),
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Process batches until the source has nothing left.
    pub async fn run_until_idle(&self) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();
        while self.run_batch(&mut stats).await? > 0 {}
        Ok(stats)
    }

    /// Process batches until `shutdown` resolves, sleeping `poll_interval`
    /// whenever the source is empty. Source errors are logged and retried on
    /// the next poll.
    pub async fn run<F>(&self, shutdown: F) -> WorkerStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = WorkerStats::default();

        loop {
            let pause = match self.run_batch(&mut stats).await {
                Ok(0) => self.poll_interval,
                Ok(_) => Duration::ZERO,
                Err(e) => {
                    warn!(error = %e, consumer = %self.consumer, "Batch failed, will retry");
                    self.poll_interval
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!(consumer = %self.consumer, %stats, "Shutdown requested, stopping");
                    return stats;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Read and process one batch. Returns the number of messages read.
    pub async fn run_batch(&self, stats: &mut WorkerStats) -> Result<usize> {
        let batch = self.source.next_batch(&self.consumer, self.batch_size).await?;
        for message in &batch {
            self.handle(message, stats).await?;
            self.source.acknowledge(&self.consumer, message.seq).await?;
        }
        Ok(batch.len())
    }

    async fn handle(&self, message: &DeliveredMessage, stats: &mut WorkerStats) -> Result<()> {
        let mut attempt = 1;
        loop {
            match route(&message.topic, &message.attributes, &self.deps).await {
                Ok(Outcome::Skipped { .. }) => {
                    stats.skipped += 1;
                    return Ok(());
                }
                Ok(outcome) => {
                    debug!(seq = message.seq, topic = %message.topic, ?outcome, "Handled message");
                    stats.handled += 1;
                    return Ok(());
                }
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        error = %e,
                        seq = message.seq,
                        topic = %message.topic,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retryable failure, retrying"
                    );
                    stats.retries += 1;
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        seq = message.seq,
                        topic = %message.topic,
                        attempts = attempt,
                        retryable = e.is_retryable(),
                        "Dead-lettering message"
                    );
                    self.source
                        .dead_letter(&self.consumer, message, &e.to_string())
                        .await?;
                    stats.dead_lettered += 1;
                    return Ok(());
                }
            }
        }
    }
}
