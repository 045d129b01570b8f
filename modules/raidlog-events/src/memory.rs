//! In-memory channel for tests. No database required.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::channel::{EventChannel, OutboundMessage};
use crate::consumer::{DeliveredMessage, MessageSource};
use crate::message::Message;
use crate::topic::Topic;

/// Records every published message and replays them to consumers in order.
/// Thread-safe. Failures can be injected per topic or for the next N publishes.
pub struct MemoryChannel {
    next_seq: AtomicI64,
    messages: Mutex<Vec<DeliveredMessage>>,
    cursors: Mutex<HashMap<String, i64>>,
    dead: Mutex<Vec<(DeliveredMessage, String)>>,
    failing_topics: Mutex<HashSet<Topic>>,
    fail_next: AtomicUsize,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicI64::new(1),
            messages: Mutex::new(Vec::new()),
            cursors: Mutex::new(HashMap::new()),
            dead: Mutex::new(Vec::new()),
            failing_topics: Mutex::new(HashSet::new()),
            fail_next: AtomicUsize::new(0),
        }
    }

    /// Every publish to `topic` fails until `heal_topic` is called.
    pub fn fail_topic(&self, topic: Topic) {
        lock(&self.failing_topics).insert(topic);
    }

    pub fn heal_topic(&self, topic: Topic) {
        lock(&self.failing_topics).remove(&topic);
    }

    /// The next `n` publishes fail, regardless of topic.
    pub fn fail_next_publishes(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// All accepted messages (for test assertions).
    pub fn published(&self) -> Vec<DeliveredMessage> {
        lock(&self.messages).clone()
    }

    /// Accepted messages of type `M`, decoded, in publish order.
    pub fn published_as<M: Message>(&self) -> Vec<M> {
        lock(&self.messages)
            .iter()
            .filter(|m| m.topic == M::TOPIC.id())
            .filter_map(|m| M::from_attributes(&m.attributes).ok())
            .collect()
    }

    pub fn dead_letters(&self) -> Vec<(DeliveredMessage, String)> {
        lock(&self.dead).clone()
    }

    pub fn clear(&self) {
        lock(&self.messages).clear();
    }

    fn take_injected_failure(&self, topic: Topic) -> bool {
        if lock(&self.failing_topics).contains(&topic) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EventChannel for MemoryChannel {
    async fn publish(&self, message: &OutboundMessage) -> Result<String> {
        if self.take_injected_failure(message.topic) {
            bail!("MemoryChannel: injected publish failure on {}", message.topic);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        lock(&self.messages).push(DeliveredMessage {
            seq,
            ts: Utc::now(),
            topic: message.topic.id().to_string(),
            attributes: message.attributes.clone(),
        });
        Ok(Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl MessageSource for MemoryChannel {
    async fn next_batch(&self, consumer: &str, limit: usize) -> Result<Vec<DeliveredMessage>> {
        let cursor = lock(&self.cursors).get(consumer).copied().unwrap_or(0);
        let mut batch: Vec<DeliveredMessage> = lock(&self.messages)
            .iter()
            .filter(|m| m.seq > cursor)
            .cloned()
            .collect();
        batch.sort_by_key(|m| m.seq);
        batch.truncate(limit);
        Ok(batch)
    }

    async fn acknowledge(&self, consumer: &str, seq: i64) -> Result<()> {
        let mut cursors = lock(&self.cursors);
        let cursor = cursors.entry(consumer.to_string()).or_insert(0);
        if seq < *cursor {
            return Err(anyhow!(
                "MemoryChannel: cursor for {consumer} cannot move back from {} to {seq}",
                *cursor
            ));
        }
        *cursor = seq;
        Ok(())
    }

    async fn dead_letter(
        &self,
        _consumer: &str,
        message: &DeliveredMessage,
        reason: &str,
    ) -> Result<()> {
        lock(&self.dead).push((message.clone(), reason.to_string()));
        Ok(())
    }
}
