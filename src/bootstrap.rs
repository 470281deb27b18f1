use std::sync::Arc;

use eyre::WrapErr;

use crate::adapters::email::{SmtpConfig, SmtpEmailAdapter};
use crate::adapters::push::FcmPushAdapter;
use crate::adapters::websocket::SocketIoWebsocketAdapter;
use crate::adapters::{EmailAdapter, PushAdapter, UnconfiguredAdapter};
use crate::config::Config;
use crate::core::cache::redis_emitter::RedisEmitter;
use crate::core::cache::redis_service::RedisService;
use crate::database;
use crate::fanout::{FanOutConfig, FanOutEngine};
use crate::queue::worker::RetryPolicy;
use crate::store::cached_preferences::CachedPreferenceStore;
use crate::store::mongo::{MongoNotificationStore, MongoPreferenceStore};
use crate::store::{NotificationStore, PreferenceStore};

/// The two persistence seams backed by MongoDB, preferences behind Redis.
#[derive(Clone)]
pub struct Stores {
    pub notifications: Arc<dyn NotificationStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

pub async fn init_stores(config: &Config) -> eyre::Result<Stores> {
    let db = database::connection(&config.database_uri, &config.database_name)
        .await
        .wrap_err("Failed to connect to MongoDB")?;
    database::ensure_indexes(&db)
        .await
        .wrap_err("Failed to create MongoDB indexes")?;

    let redis = RedisService::connect(&config.redis_url)
        .await
        .wrap_err("Failed to connect to Redis")?;

    let preferences = CachedPreferenceStore::new(
        Arc::new(MongoPreferenceStore::new(db.clone())),
        Arc::new(redis),
    );

    Ok(Stores {
        notifications: Arc::new(MongoNotificationStore::new(db)),
        preferences: Arc::new(preferences),
    })
}

/// Builds the engine with every adapter the configuration enables. Email and
/// push without credentials fall back to [`UnconfiguredAdapter`], which fails
/// those channels instead of refusing to start.
pub fn init_fan_out_engine(config: &Config, stores: &Stores) -> eyre::Result<FanOutEngine> {
    let email: Arc<dyn EmailAdapter> = match &config.smtp_host {
        Some(host) => Arc::new(SmtpEmailAdapter::new(&SmtpConfig {
            host: host.clone(),
            port: config.smtp_port,
            from_address: config.smtp_from.clone(),
            user: config.smtp_user.clone(),
            password: config.smtp_password.clone(),
        })
        .map_err(|e| eyre::eyre!("Failed to create SMTP transport: {e:#}"))?),
        None => {
            tracing::warn!("SMTP_HOST is not set, email delivery is disabled");
            Arc::new(UnconfiguredAdapter)
        }
    };

    let push: Arc<dyn PushAdapter> = match &config.firebase_credentials_path {
        Some(path) => Arc::new(FcmPushAdapter::new(path).map_err(|e| eyre::eyre!("{e:#}"))?),
        None => {
            tracing::warn!("FIREBASE_CREDENTIALS_PATH is not set, push delivery is disabled");
            Arc::new(UnconfiguredAdapter)
        }
    };

    let emitter = RedisEmitter::new(&config.redis_url)
        .map_err(|e| eyre::eyre!("Failed to create Socket.IO emitter: {e:#}"))?;
    let websocket = SocketIoWebsocketAdapter::new(emitter);

    Ok(FanOutEngine::new(
        stores.notifications.clone(),
        stores.preferences.clone(),
        email,
        push,
        Arc::new(websocket),
        FanOutConfig {
            product_name: config.product_name.clone(),
            adapter_timeout: config.adapter_timeout(),
        },
    ))
}

pub fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy {
        max_retries: config.dispatch_max_retries,
        base_delay: std::time::Duration::from_millis(config.dispatch_retry_base_ms),
    }
}
