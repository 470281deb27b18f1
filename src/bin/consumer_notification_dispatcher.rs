use std::sync::Arc;

use fanout_notify_service::bootstrap::{init_fan_out_engine, init_stores, retry_policy};
use fanout_notify_service::config::APP_CONFIG;
use fanout_notify_service::core::kafka_service::consumers::streams::KafkaStreamConsumerExt;
use fanout_notify_service::core::kafka_service::producer::create_kafka_producer;
use fanout_notify_service::queue::kafka::{KafkaDeadLetterSink, NotificationDispatchConsumer};
use fanout_notify_service::queue::worker::DispatchWorker;
use fanout_notify_service::utils::tracing::init_standard_tracing;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    let config = &*APP_CONFIG;
    init_standard_tracing(env!("CARGO_CRATE_NAME"), &config.log_level);

    let kafka_config = config.kafka_config();
    let stores = init_stores(config).await?;
    let engine = init_fan_out_engine(config, &stores)?;

    let producer = create_kafka_producer(&kafka_config).map_err(|e| eyre::eyre!("{e:#}"))?;
    let dead_letters = KafkaDeadLetterSink::new(producer, config.queue_message_format);
    let worker = DispatchWorker::new(engine, retry_policy(config), Arc::new(dead_letters));

    let consumer = NotificationDispatchConsumer::new(worker);
    tracing::info!("Starting notification dispatcher");
    consumer
        .run_batch(
            &kafka_config,
            config.queue_message_format,
            config.dispatch_batch_size,
            config.dispatch_batch_timeout_ms,
        )
        .await
        .map_err(|e| eyre::eyre!("Notification dispatcher stopped: {e:#}"))?;

    Ok(())
}
