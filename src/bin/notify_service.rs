use std::net::SocketAddr;
use std::sync::Arc;

use fanout_notify_service::app::create_app;
use fanout_notify_service::app_state::AppState;
use fanout_notify_service::bootstrap::{init_fan_out_engine, init_stores, retry_policy};
use fanout_notify_service::config::{APP_CONFIG, QueueBackend};
use fanout_notify_service::core::jwt_auth::jwt_auth::JwtConfig;
use fanout_notify_service::core::kafka_service::producer::create_kafka_producer;
use fanout_notify_service::queue::NotificationQueue;
use fanout_notify_service::queue::kafka::KafkaNotificationQueue;
use fanout_notify_service::queue::local::LocalNotificationQueue;
use fanout_notify_service::queue::worker::{DispatchWorker, LogDeadLetterSink};
use fanout_notify_service::utils::tracing::init_standard_tracing;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    let config = &*APP_CONFIG;
    init_standard_tracing(env!("CARGO_CRATE_NAME"), &config.log_level);

    let stores = init_stores(config).await?;

    let queue: Arc<dyn NotificationQueue> = match config.queue_backend {
        QueueBackend::Kafka => {
            let producer = create_kafka_producer(&config.kafka_config())
                .map_err(|e| eyre::eyre!("{e:#}"))?;
            tracing::info!("Queueing notifications to Kafka at {}", config.kafka_brokers);
            Arc::new(KafkaNotificationQueue::new(
                producer,
                config.queue_message_format,
            ))
        }
        QueueBackend::Local => {
            let engine = init_fan_out_engine(config, &stores)?;
            let worker = DispatchWorker::new(
                engine,
                retry_policy(config),
                Arc::new(LogDeadLetterSink),
            );
            let (queue, _worker_handle) =
                LocalNotificationQueue::start(worker, config.local_queue_capacity);
            tracing::info!("Dispatching notifications in-process");
            Arc::new(queue)
        }
    };

    let state = AppState::new(
        stores.notifications,
        stores.preferences,
        queue,
        JwtConfig::new(&config.jwt_secret_key),
        &config.app_env,
    );
    let app = create_app(state, config)?;

    let address = format!("0.0.0.0:{}", config.port);
    tracing::info!("Server listening on {}", &address);
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
