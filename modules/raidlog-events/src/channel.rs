use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::warn;

use crate::message::{Attributes, Message};
use crate::topic::Topic;

/// A message ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: Topic,
    pub attributes: Attributes,
}

impl OutboundMessage {
    pub fn new<M: Message>(message: &M) -> Self {
        Self {
            topic: M::TOPIC,
            attributes: message.to_attributes(),
        }
    }

    /// Decode back into `M` if the topic matches.
    pub fn decode<M: Message>(&self) -> Option<M> {
        if self.topic != M::TOPIC {
            return None;
        }
        M::from_attributes(&self.attributes).ok()
    }
}

/// At-least-once publish side of the channel.
///
/// Implemented by `PgOutbox` (postgres) and `MemoryChannel` (tests).
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Publish one message. Resolves once the transport has accepted it and
    /// returns the transport's message id.
    async fn publish(&self, message: &OutboundMessage) -> Result<String>;
}

#[async_trait]
impl<C: EventChannel + ?Sized> EventChannel for Arc<C> {
    async fn publish(&self, message: &OutboundMessage) -> Result<String> {
        (**self).publish(message).await
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{failed} of {total} publishes failed")]
pub struct PublishError {
    pub failed: usize,
    pub total: usize,
}

/// Publish all messages concurrently and wait for every one to settle.
///
/// Failures are logged individually and reported together; the messages that
/// did go out are not retracted. Returns the number published.
pub async fn publish_all(
    channel: &dyn EventChannel,
    messages: &[OutboundMessage],
) -> Result<usize, PublishError> {
    let total = messages.len();
    let results = join_all(messages.iter().map(|m| channel.publish(m))).await;

    let mut failed = 0;
    for (message, result) in messages.iter().zip(results) {
        if let Err(e) = result {
            warn!(topic = %message.topic, error = %e, "Failed to publish");
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(PublishError { failed, total });
    }
    Ok(total)
}
