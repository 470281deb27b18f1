use clap::{Parser, ValueEnum};
use once_cell::sync::Lazy;
use std::time::Duration;

use crate::common::MessageFormat;

pub static APP_CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenvy::dotenv().ok();
    Config::parse()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueueBackend {
    /// Requests are published to Kafka and consumed by `consumer_notification_dispatcher`
    Kafka,
    /// Requests are dispatched by a worker task inside the API process
    Local,
}

#[derive(Debug, Parser)]
pub struct Config {
    #[clap(long, env, default_value_t = 8080)]
    pub port: u16,

    #[clap(long, env)]
    pub database_uri: String,

    #[clap(long, env)]
    pub database_name: String,

    #[clap(long, env, default_value = "info")]
    pub log_level: String,

    #[clap(long, env, default_value_t = false)]
    pub swagger_enabled: bool,

    /// Burst size of the per-user (or per-IP) limiter on the user routes
    #[clap(long, env, default_value_t = 100)]
    pub rate_limit_req_per_sec: u32,

    /// Sustained rate of the per-IP limiter on the ingress route; unlimited when unset
    #[clap(long, env)]
    pub ingress_rate_limit_per_sec: Option<u32>,

    #[clap(long, env, value_delimiter = ',')]
    pub cors_origin_whitelist: Option<Vec<String>>,

    #[clap(long, env)]
    pub jwt_secret_key: String,

    #[clap(long, env, default_value = "local")]
    pub app_env: String,

    #[clap(long, env)]
    pub redis_url: String,

    #[clap(long, env, value_enum, default_value_t = QueueBackend::Kafka)]
    pub queue_backend: QueueBackend,

    #[clap(long, env, value_enum, default_value_t = MessageFormat::Json)]
    pub queue_message_format: MessageFormat,

    #[clap(long, env, default_value_t = 1024)]
    pub local_queue_capacity: usize,

    #[clap(long, env, default_value = "localhost:9092")]
    pub kafka_brokers: String,

    #[clap(long, env, default_value = "notification-dispatcher")]
    pub kafka_group_id: String,

    #[clap(long, env, default_value_t = false)]
    pub kafka_ssl_enabled: bool,

    #[clap(long, env, default_value = "")]
    pub kafka_sasl_username: String,

    #[clap(long, env, default_value = "")]
    pub kafka_sasl_password: String,

    #[clap(long, env, default_value_t = true)]
    pub enable_idempotence: bool,

    #[clap(long, env, default_value = "SoundScape-AI")]
    pub product_name: String,

    #[clap(long, env)]
    pub smtp_host: Option<String>,

    #[clap(long, env, default_value_t = 587)]
    pub smtp_port: u16,

    #[clap(long, env, default_value = "noreply@soundscape.ai")]
    pub smtp_from: String,

    #[clap(long, env)]
    pub smtp_user: Option<String>,

    #[clap(long, env)]
    pub smtp_password: Option<String>,

    #[clap(long, env)]
    pub firebase_credentials_path: Option<String>,

    /// Upper bound for a single delivery adapter call
    #[clap(long, env, default_value_t = 10_000)]
    pub adapter_timeout_ms: u64,

    #[clap(long, env, default_value_t = 3)]
    pub dispatch_max_retries: usize,

    #[clap(long, env, default_value_t = 500)]
    pub dispatch_retry_base_ms: u64,

    /// Most queued notifications the Kafka dispatcher fans out at once
    #[clap(long, env, default_value_t = 50)]
    pub dispatch_batch_size: usize,

    #[clap(long, env, default_value_t = 500)]
    pub dispatch_batch_timeout_ms: u64,
}

impl Config {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    pub fn kafka_config(&self) -> KafkaConfig {
        KafkaConfig {
            kafka_group_id: self.kafka_group_id.clone(),
            kafka_brokers: self.kafka_brokers.clone(),
            kafka_ssl_enabled: self.kafka_ssl_enabled,
            kafka_sasl_username: self.kafka_sasl_username.clone(),
            kafka_sasl_password: self.kafka_sasl_password.clone(),
            enable_idempotence: self.enable_idempotence,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub kafka_group_id: String,
    pub kafka_brokers: String,
    pub kafka_ssl_enabled: bool,
    pub kafka_sasl_username: String,
    pub kafka_sasl_password: String,
    pub enable_idempotence: bool,
}
