use anyhow::{Context, Error};
use rdkafka::{
    ClientConfig,
    producer::{FutureProducer, FutureRecord},
};
use serde::Serialize;
use std::time::Duration;

use crate::common::MessageFormat;
use crate::config::KafkaConfig;
use crate::core::kafka_service::consumers::streams::configure_ssl;

pub fn create_kafka_producer(kafka_config: &KafkaConfig) -> Result<FutureProducer, Error> {
    let mut binding = ClientConfig::new();
    let config = binding
        .set("bootstrap.servers", kafka_config.kafka_brokers.clone())
        .set("message.timeout.ms", "5000")
        .set(
            "enable.idempotence",
            kafka_config.enable_idempotence.to_string().as_str(),
        )
        .set("acks", "all")
        .set("retries", "5");

    if kafka_config.kafka_ssl_enabled {
        configure_ssl(config, kafka_config);
    }

    config.create().context("Producer creation error")
}

/// Publishes one record keyed by `key`, so records sharing a key land on the
/// same partition in order.
pub async fn publish_kafka_message_with_key<T: Serialize>(
    producer: &FutureProducer,
    topic: &str,
    key: &str,
    record: &T,
    format: MessageFormat,
) -> anyhow::Result<()> {
    let payload = format.encode(record)?;
    let record = FutureRecord::<'_, str, [u8]>::to(topic)
        .key(key)
        .payload(&payload);

    producer
        .send(record, Duration::from_secs(0))
        .await
        .map_err(|(err, _)| anyhow::anyhow!("Error sending to Kafka topic {topic}: {err:?}"))?;

    Ok(())
}
