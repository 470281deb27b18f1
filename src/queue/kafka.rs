use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::producer::FutureProducer;
use serde::{Deserialize, Serialize};

use crate::common::{MessageFormat, MessageWithOffset};
use crate::core::kafka_service::consumers::streams::KafkaStreamConsumer;
use crate::core::kafka_service::producer::publish_kafka_message_with_key;
use crate::enums::KafkaTopic;
use crate::errors::Error;
use crate::models::notification_request::NotificationRequest;
use crate::queue::NotificationQueue;
use crate::queue::worker::{DeadLetterSink, DispatchWorker};

/// Publishes requests to the ingress topic keyed by user id, which keeps one
/// user's notifications on one partition.
#[derive(Clone)]
pub struct KafkaNotificationQueue {
    producer: FutureProducer,
    format: MessageFormat,
}

impl KafkaNotificationQueue {
    pub fn new(producer: FutureProducer, format: MessageFormat) -> Self {
        Self { producer, format }
    }
}

#[async_trait]
impl NotificationQueue for KafkaNotificationQueue {
    async fn enqueue(&self, request: NotificationRequest) -> Result<(), Error> {
        publish_kafka_message_with_key(
            &self.producer,
            &KafkaTopic::NotificationIngress.to_string(),
            &request.user_id,
            &request,
            self.format,
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub request: NotificationRequest,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

pub struct KafkaDeadLetterSink {
    producer: FutureProducer,
    format: MessageFormat,
}

impl KafkaDeadLetterSink {
    pub fn new(producer: FutureProducer, format: MessageFormat) -> Self {
        Self { producer, format }
    }
}

#[async_trait]
impl DeadLetterSink for KafkaDeadLetterSink {
    async fn dead_letter(
        &self,
        request: &NotificationRequest,
        error: &Error,
    ) -> anyhow::Result<()> {
        let dead_letter = DeadLetter {
            request: request.clone(),
            error: error.to_string(),
            failed_at: Utc::now(),
        };
        publish_kafka_message_with_key(
            &self.producer,
            &KafkaTopic::NotificationDeadLetter.to_string(),
            &request.user_id,
            &dead_letter,
            self.format,
        )
        .await?;

        tracing::error!(
            user_id = %request.user_id,
            notification_type = %request.r#type,
            "notification moved to dead-letter topic: {error}"
        );
        Ok(())
    }
}

/// Drains the ingress topic into the dispatch worker, one batch of concurrent
/// fan-outs at a time.
pub struct NotificationDispatchConsumer {
    worker: DispatchWorker,
}

impl NotificationDispatchConsumer {
    pub fn new(worker: DispatchWorker) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl KafkaStreamConsumer<NotificationRequest> for NotificationDispatchConsumer {
    fn topic(&self) -> String {
        KafkaTopic::NotificationIngress.to_string()
    }

    async fn handle_single_message(
        &self,
        message: MessageWithOffset<NotificationRequest>,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            partition = message.partition,
            offset = message.offset,
            user_id = %message.message.user_id,
            "dispatching queued notification"
        );
        self.worker.handle(message.message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_letter_keeps_the_original_request() {
        let dead_letter = DeadLetter {
            request: NotificationRequest::new("u1", "track_like", "t", "m"),
            error: "Internal error: database unavailable".to_string(),
            failed_at: Utc::now(),
        };
        let value = serde_json::to_value(&dead_letter).unwrap();
        assert_eq!(value["request"]["userId"], "u1");
        assert!(value.get("failedAt").is_some());
    }
}
