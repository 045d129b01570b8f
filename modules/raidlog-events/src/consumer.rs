//! Consumer side of the channel: ordered delivery with per-consumer cursors.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Attributes;

/// A message as delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredMessage {
    pub seq: i64,
    pub ts: DateTime<Utc>,
    /// Raw topic id. Unknown topics are delivered as-is and rejected by the router.
    pub topic: String,
    pub attributes: Attributes,
}

/// Source of deliveries for one named consumer.
///
/// A message stays deliverable until the consumer acknowledges its seq, so a
/// crash between handling and acknowledging redelivers it.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Next messages after the consumer's cursor, in seq order.
    async fn next_batch(&self, consumer: &str, limit: usize) -> Result<Vec<DeliveredMessage>>;

    /// Move the consumer's cursor to `seq` (inclusive).
    async fn acknowledge(&self, consumer: &str, seq: i64) -> Result<()>;

    /// Park a message that cannot be handled. Does not move the cursor.
    async fn dead_letter(
        &self,
        consumer: &str,
        message: &DeliveredMessage,
        reason: &str,
    ) -> Result<()>;
}
