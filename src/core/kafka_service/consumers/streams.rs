use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, stream};
use rdkafka::{
    ClientConfig, Message, Offset, TopicPartitionList,
    consumer::{CommitMode, Consumer, StreamConsumer},
};
use serde::de::DeserializeOwned;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
    future::Future,
    time::{Duration, Instant},
};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::common::{MessageFormat, MessageWithOffset};
use crate::config::KafkaConfig;

const SESSION_TIMEOUT_MS: u64 = 30_000;

// ===== Configuration Types =====

#[derive(Debug, Clone)]
pub struct StreamConsumerConfig {
    pub format: MessageFormat,
    /// Most messages collected per batch. They are all handled concurrently.
    pub batch_size: usize,
    /// Longest wait for a batch to fill up.
    pub batch_timeout_ms: u64,
}

impl StreamConsumerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("batch_size must be greater than 0"));
        }
        if self.batch_timeout_ms == 0 {
            return Err(anyhow::anyhow!("batch_timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}

// ===== Stream Consumer Builder =====

pub struct StreamConsumerBuilder {
    config: StreamConsumerConfig,
}

impl Default for StreamConsumerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConsumerBuilder {
    pub fn new() -> Self {
        Self {
            config: StreamConsumerConfig {
                format: MessageFormat::Json,
                batch_size: 50,
                batch_timeout_ms: 500,
            },
        }
    }

    pub fn format(mut self, format: MessageFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn batch_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.batch_timeout_ms = timeout;
        self
    }

    pub fn build(self) -> StreamConsumerConfig {
        self.config
    }
}

// ===== Helper Functions =====

pub fn handle_message_payload<T: DeserializeOwned>(
    msg: &rdkafka::message::BorrowedMessage,
    format: MessageFormat,
) -> Result<MessageWithOffset<T>> {
    let payload = msg.payload().context("Message payload is empty")?;

    let message: T = format.decode(payload)?;

    Ok(MessageWithOffset {
        message,
        offset: msg.offset(),
        partition: msg.partition(),
        topic: msg.topic().to_string(),
    })
}

/// Applies the shared SASL_SSL settings to a client config.
pub fn configure_ssl(config: &mut ClientConfig, kafka_config: &KafkaConfig) {
    config.set("security.protocol", "SASL_SSL");

    let sasl_username = &kafka_config.kafka_sasl_username;
    let sasl_password = &kafka_config.kafka_sasl_password;

    if !sasl_username.is_empty() && !sasl_password.is_empty() {
        config
            .set("sasl.mechanism", "PLAIN")
            .set("sasl.username", sasl_username)
            .set("sasl.password", sasl_password);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A received message. `message` is `None` when the payload could not be
/// decoded; such entries count as handled.
pub struct BatchEntry<T> {
    pub position: MessagePosition,
    pub message: Option<MessageWithOffset<T>>,
}

/// Runs `handler` over the batch with at most `concurrency` messages in
/// flight. Outcomes come back in receive order.
pub async fn process_batch_concurrently<T, F, Fut>(
    batch: Vec<BatchEntry<T>>,
    concurrency: usize,
    handler: F,
) -> Vec<(MessagePosition, Result<()>)>
where
    F: Fn(MessageWithOffset<T>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut outcomes: Vec<(usize, MessagePosition, Result<()>)> =
        stream::iter(batch.into_iter().enumerate())
            .map(|(index, entry)| {
                let handled = entry.message.map(&handler);
                let position = entry.position;
                async move {
                    let result = match handled {
                        Some(handled) => handled.await,
                        None => Ok(()),
                    };
                    (index, position, result)
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    outcomes.sort_by_key(|(index, _, _)| *index);
    outcomes
        .into_iter()
        .map(|(_, position, result)| (position, result))
        .collect()
}

/// Offset to commit per partition: just past the last message of the
/// unbroken run of handled messages at the head of that partition.
/// Partitions whose first message failed are left out.
pub fn committable_offsets(outcomes: &[(MessagePosition, Result<()>)]) -> Vec<(String, i32, i64)> {
    let mut next: BTreeMap<(String, i32), i64> = BTreeMap::new();
    let mut blocked: BTreeSet<(String, i32)> = BTreeSet::new();

    for (position, result) in outcomes {
        let key = (position.topic.clone(), position.partition);
        if blocked.contains(&key) {
            continue;
        }
        match result {
            Ok(()) => {
                next.insert(key, position.offset + 1);
            }
            Err(_) => {
                blocked.insert(key);
            }
        }
    }

    next.into_iter()
        .map(|((topic, partition), offset)| (topic, partition, offset))
        .collect()
}

fn commit_offsets(consumer: &StreamConsumer, offsets: &[(String, i32, i64)]) -> Result<()> {
    let mut tpl = TopicPartitionList::new();
    for (topic, partition, offset) in offsets {
        tpl.add_partition_offset(topic, *partition, Offset::Offset(*offset))?;
    }
    consumer
        .commit(&tpl, CommitMode::Async)
        .context("Failed to commit batch offsets")?;

    info!("Committed offsets: {:?}", offsets);
    Ok(())
}

// ===== Main Consumer Trait =====

/// A consumer that collects messages into batches and handles each batch
/// concurrently. Offsets are committed per partition up to the first failed
/// message; a failure then stops the consumer so the rest is redelivered
/// after restart.
#[async_trait]
pub trait KafkaStreamConsumer<T>: Send + Sync
where
    T: Debug + DeserializeOwned + Send + 'static,
{
    /// Returns the topic name to consume from
    fn topic(&self) -> String;

    /// Handles a single message
    async fn handle_single_message(&self, message: MessageWithOffset<T>) -> Result<()>;

    /// Creates a Kafka consumer subscribed to [`Self::topic`]
    fn create_consumer(&self, kafka_config: &KafkaConfig) -> Result<StreamConsumer> {
        let mut config = ClientConfig::new();

        config
            .set("group.id", kafka_config.kafka_group_id.clone())
            .set("bootstrap.servers", kafka_config.kafka_brokers.clone())
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", SESSION_TIMEOUT_MS.to_string())
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest");

        if kafka_config.kafka_ssl_enabled {
            configure_ssl(&mut config, kafka_config);
        }

        let consumer: StreamConsumer =
            config.create().context("Failed to create Kafka consumer")?;

        consumer
            .subscribe(&[&self.topic()])
            .context("Failed to subscribe to topic")?;

        Ok(consumer)
    }

    /// Starts consuming messages in batches
    async fn start_batch_consumer(
        &self,
        kafka_config: &KafkaConfig,
        config: StreamConsumerConfig,
    ) -> Result<()> {
        config.validate()?;
        let consumer = self.create_consumer(kafka_config)?;

        info!("Started batch consumer for topic: {}", self.topic());

        let batch_timeout = Duration::from_millis(config.batch_timeout_ms);

        loop {
            let batch_start_time = Instant::now();
            let mut batch: Vec<BatchEntry<T>> = Vec::with_capacity(config.batch_size);

            while batch.len() < config.batch_size {
                let elapsed = batch_start_time.elapsed();
                if elapsed >= batch_timeout {
                    break;
                }

                match timeout(batch_timeout - elapsed, consumer.recv()).await {
                    Ok(Ok(msg)) => {
                        info!(
                            topic = %msg.topic(),
                            partition = msg.partition(),
                            offset = msg.offset(),
                            "Received message"
                        );
                        let position = MessagePosition {
                            topic: msg.topic().to_string(),
                            partition: msg.partition(),
                            offset: msg.offset(),
                        };
                        let message = match handle_message_payload::<T>(&msg, config.format) {
                            Ok(message) => Some(message),
                            Err(e) => {
                                // Undecodable payloads would block the partition forever.
                                warn!(error = ?e, offset = msg.offset(), "Skipping undecodable message");
                                None
                            }
                        };
                        batch.push(BatchEntry { position, message });
                    }
                    Ok(Err(e)) => {
                        error!(error = ?e, "Error receiving message");
                        return Err(e.into());
                    }
                    Err(_) => break,
                }
            }

            if batch.is_empty() {
                continue;
            }

            let batch_size = batch.len();
            let outcomes = process_batch_concurrently(batch, config.batch_size, |message| {
                self.handle_single_message(message)
            })
            .await;

            let offsets = committable_offsets(&outcomes);
            if !offsets.is_empty() {
                commit_offsets(&consumer, &offsets)?;
            }

            let failure = outcomes
                .into_iter()
                .find_map(|(position, result)| result.err().map(|e| (position, e)));
            if let Some((position, e)) = failure {
                error!(
                    error = ?e,
                    partition = position.partition,
                    offset = position.offset,
                    "Error processing message, not committing it or later offsets of its partition"
                );
                return Err(e.context("Failed to process batch"));
            }

            info!(
                "Processed batch of {} messages in {:?}",
                batch_size,
                batch_start_time.elapsed()
            );
        }
    }
}

// ===== Extension Trait =====

#[async_trait]
pub trait KafkaStreamConsumerExt<T>: KafkaStreamConsumer<T>
where
    T: Debug + DeserializeOwned + Send + 'static,
{
    async fn run_batch(
        &self,
        kafka_config: &KafkaConfig,
        format: MessageFormat,
        batch_size: usize,
        batch_timeout_ms: u64,
    ) -> Result<()> {
        let config = StreamConsumerBuilder::new()
            .format(format)
            .batch_size(batch_size)
            .batch_timeout_ms(batch_timeout_ms)
            .build();
        self.start_batch_consumer(kafka_config, config).await
    }
}

// ===== Blanket Implementation =====

impl<T, U> KafkaStreamConsumerExt<T> for U
where
    T: Debug + DeserializeOwned + Send + 'static,
    U: KafkaStreamConsumer<T>,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn entry(partition: i32, offset: i64, message: Option<&str>) -> BatchEntry<String> {
        let topic = "notification-ingress".to_string();
        BatchEntry {
            position: MessagePosition {
                topic: topic.clone(),
                partition,
                offset,
            },
            message: message.map(|message| MessageWithOffset {
                message: message.to_string(),
                offset,
                partition,
                topic,
            }),
        }
    }

    fn outcome(partition: i32, offset: i64, ok: bool) -> (MessagePosition, Result<()>) {
        let result = if ok {
            Ok(())
        } else {
            Err(anyhow::anyhow!("dead-letter publish failed"))
        };
        (
            MessagePosition {
                topic: "notification-ingress".to_string(),
                partition,
                offset,
            },
            result,
        )
    }

    #[tokio::test]
    async fn batch_messages_are_handled_concurrently() {
        let batch = vec![
            entry(0, 1, Some("a")),
            entry(0, 2, Some("b")),
            entry(1, 7, Some("c")),
        ];
        // Each handler waits for all three, so a sequential run never finishes.
        let barrier = Arc::new(Barrier::new(3));
        let outcomes = timeout(
            Duration::from_secs(5),
            process_batch_concurrently(batch, 3, |_message| {
                let barrier = barrier.clone();
                async move {
                    barrier.wait().await;
                    Ok(())
                }
            }),
        )
        .await
        .expect("batch handled one message at a time");

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|(_, result)| result.is_ok()));
    }

    #[tokio::test]
    async fn outcomes_keep_receive_order_and_skip_undecodable_entries() {
        let batch = vec![
            entry(0, 1, Some("slow")),
            entry(0, 2, None),
            entry(0, 3, Some("fail")),
        ];
        let outcomes = process_batch_concurrently(batch, 4, |message| async move {
            match message.message.as_str() {
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                }
                _ => Err(anyhow::anyhow!("handler failed")),
            }
        })
        .await;

        let offsets: Vec<i64> = outcomes.iter().map(|(p, _)| p.offset).collect();
        assert_eq!(offsets, vec![1, 2, 3]);
        assert!(outcomes[0].1.is_ok());
        assert!(outcomes[1].1.is_ok());
        assert!(outcomes[2].1.is_err());
    }

    #[test]
    fn commits_stop_at_the_first_failure_of_each_partition() {
        let outcomes = vec![
            outcome(0, 10, true),
            outcome(1, 5, true),
            outcome(0, 11, false),
            outcome(2, 40, false),
            outcome(0, 12, true),
            outcome(1, 6, true),
            outcome(2, 41, true),
        ];

        assert_eq!(
            committable_offsets(&outcomes),
            vec![
                ("notification-ingress".to_string(), 0, 11),
                ("notification-ingress".to_string(), 1, 7),
            ]
        );
    }

    #[test]
    fn empty_batches_are_rejected_by_config() {
        let config = StreamConsumerBuilder::new().batch_size(0).build();
        assert!(config.validate().is_err());
        assert!(StreamConsumerBuilder::new().build().validate().is_ok());
    }
}
