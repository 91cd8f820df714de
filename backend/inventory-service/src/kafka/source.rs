//! Event sources
//!
//! A source hands out batches of raw payloads in delivery order and accepts
//! a commit once a batch has been fully processed. Committing after the
//! batch (never before) is what makes delivery at-least-once.

use super::KafkaConnection;
use crate::error::SourceError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One undecoded event as delivered by the log
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Empty when the message carried no payload
    pub payload: Bytes,
}

#[async_trait]
pub trait EventSource: Send {
    /// Register with the log; called again after every transport error
    async fn subscribe(&mut self) -> Result<(), SourceError>;

    /// Wait for the next batch. `Ok(None)` means the source is closed for good.
    async fn next_batch(&mut self) -> Result<Option<Vec<RawEvent>>, SourceError>;

    /// Mark every event in `batch` as consumed
    async fn commit(&mut self, batch: &[RawEvent]) -> Result<(), SourceError>;
}

// ========================================
// Kafka
// ========================================

#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    pub connection: KafkaConnection,
    pub topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub batch_max_size: usize,
    pub batch_max_wait: Duration,
}

impl KafkaSourceConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            connection: KafkaConnection::from_config(config),
            topic: config.kafka_topic.clone(),
            group_id: config.kafka_group_id.clone(),
            auto_offset_reset: config.kafka_auto_offset_reset.clone(),
            batch_max_size: config.batch_max_size,
            batch_max_wait: config.batch_max_wait(),
        }
    }
}

/// Kafka consumer-group source with manual commits
pub struct KafkaEventSource {
    config: KafkaSourceConfig,
    consumer: Option<StreamConsumer>,
}

impl KafkaEventSource {
    pub fn new(config: KafkaSourceConfig) -> Self {
        Self {
            config,
            consumer: None,
        }
    }

    fn connected(&self) -> Result<&StreamConsumer, SourceError> {
        self.consumer
            .as_ref()
            .ok_or_else(|| SourceError::Subscribe("consumer is not subscribed".into()))
    }
}

fn to_raw<M: Message>(message: &M) -> RawEvent {
    RawEvent {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        payload: message
            .payload()
            .map(Bytes::copy_from_slice)
            .unwrap_or_default(),
    }
}

/// Highest offset per (topic, partition) in a batch
fn commit_offsets(batch: &[RawEvent]) -> BTreeMap<(String, i32), i64> {
    let mut offsets = BTreeMap::new();
    for event in batch {
        let entry = offsets
            .entry((event.topic.clone(), event.partition))
            .or_insert(event.offset);
        *entry = (*entry).max(event.offset);
    }
    offsets
}

#[async_trait]
impl EventSource for KafkaEventSource {
    async fn subscribe(&mut self) -> Result<(), SourceError> {
        // Drop any previous client before building a fresh one
        self.consumer = None;

        let consumer: StreamConsumer = self
            .config
            .connection
            .client_config()
            .set("group.id", &self.config.group_id)
            .set("enable.auto.commit", "false") // Manual commit after each batch
            .set("auto.offset.reset", &self.config.auto_offset_reset)
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| SourceError::Subscribe(e.to_string()))?;

        consumer
            .subscribe(&[self.config.topic.as_str()])
            .map_err(|e| SourceError::Subscribe(e.to_string()))?;

        info!(
            topic = %self.config.topic,
            group_id = %self.config.group_id,
            "Kafka consumer subscribed"
        );
        self.consumer = Some(consumer);
        Ok(())
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<RawEvent>>, SourceError> {
        let consumer = self.connected()?;
        let max_size = self.config.batch_max_size.max(1);

        let first = to_raw(&consumer.recv().await?);
        let mut batch = Vec::with_capacity(max_size);
        batch.push(first);

        let deadline = Instant::now() + self.config.batch_max_wait;
        while batch.len() < max_size {
            match tokio::time::timeout_at(deadline, consumer.recv()).await {
                Ok(Ok(message)) => batch.push(to_raw(&message)),
                Ok(Err(e)) => {
                    // Hand out what was collected; the error itself is only logged here
                    warn!(error = %e, collected = batch.len(), "Kafka error while filling batch");
                    break;
                }
                Err(_) => break,
            }
        }

        debug!(size = batch.len(), "Kafka batch collected");
        Ok(Some(batch))
    }

    async fn commit(&mut self, batch: &[RawEvent]) -> Result<(), SourceError> {
        if batch.is_empty() {
            return Ok(());
        }
        let consumer = self.connected()?;

        let mut offsets = TopicPartitionList::new();
        for ((topic, partition), offset) in commit_offsets(batch) {
            offsets
                .add_partition_offset(&topic, partition, Offset::Offset(offset + 1))
                .map_err(|e| SourceError::Commit(e.to_string()))?;
        }

        consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| SourceError::Commit(e.to_string()))
    }
}

// ========================================
// In-memory channel
// ========================================

enum ChannelMessage {
    Batch(Vec<Bytes>),
    TransportError(String),
}

/// Shared view into a [`ChannelEventSource`] for assertions
#[derive(Default)]
pub struct ChannelSourceProbe {
    committed: Mutex<Vec<i64>>,
    subscribe_calls: AtomicU32,
    subscribe_failures: AtomicU32,
}

impl ChannelSourceProbe {
    /// Offsets committed so far, in commit order
    pub fn committed(&self) -> Vec<i64> {
        self.committed.lock().clone()
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Make the next `count` subscribe attempts fail
    pub fn fail_subscribes(&self, count: u32) {
        self.subscribe_failures.store(count, Ordering::SeqCst);
    }
}

/// Feeds batches into a [`ChannelEventSource`]; dropping it closes the source
#[derive(Clone)]
pub struct ChannelEventSender {
    tx: mpsc::Sender<ChannelMessage>,
}

impl ChannelEventSender {
    pub async fn send_batch<I, P>(&self, payloads: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        let batch = payloads.into_iter().map(Into::into).collect();
        self.tx.send(ChannelMessage::Batch(batch)).await.is_ok()
    }

    /// Simulate a broker disconnect
    pub async fn send_error(&self, message: impl Into<String>) -> bool {
        self.tx
            .send(ChannelMessage::TransportError(message.into()))
            .await
            .is_ok()
    }
}

/// Source backed by a Tokio channel; each sent batch is delivered as-is on
/// partition 0 with consecutive offsets
pub struct ChannelEventSource {
    topic: String,
    rx: mpsc::Receiver<ChannelMessage>,
    next_offset: i64,
    probe: Arc<ChannelSourceProbe>,
}

impl ChannelEventSource {
    pub fn new(buffer: usize) -> (Self, ChannelEventSender, Arc<ChannelSourceProbe>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let probe = Arc::new(ChannelSourceProbe::default());
        let source = Self {
            topic: "inventory-events".to_string(),
            rx,
            next_offset: 0,
            probe: probe.clone(),
        };
        (source, ChannelEventSender { tx }, probe)
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn subscribe(&mut self) -> Result<(), SourceError> {
        self.probe.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .probe
            .subscribe_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SourceError::Subscribe("broker unavailable".into()));
        }
        Ok(())
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<RawEvent>>, SourceError> {
        match self.rx.recv().await {
            Some(ChannelMessage::Batch(payloads)) => {
                let batch = payloads
                    .into_iter()
                    .map(|payload| {
                        let offset = self.next_offset;
                        self.next_offset += 1;
                        RawEvent {
                            topic: self.topic.clone(),
                            partition: 0,
                            offset,
                            payload,
                        }
                    })
                    .collect();
                Ok(Some(batch))
            }
            Some(ChannelMessage::TransportError(message)) => Err(SourceError::Transport(message)),
            None => Ok(None),
        }
    }

    async fn commit(&mut self, batch: &[RawEvent]) -> Result<(), SourceError> {
        if let Some(last) = batch.iter().map(|e| e.offset).max() {
            self.probe.committed.lock().push(last + 1);
        }
        Ok(())
    }
}
