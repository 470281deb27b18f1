#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fanout_notify_service::app::{api_router, create_app};
use fanout_notify_service::app_state::AppState;
use fanout_notify_service::config::Config;
use fanout_notify_service::core::jwt_auth::jwt_auth::JwtConfig;
use fanout_notify_service::errors::Error;
use fanout_notify_service::models::notification_request::NotificationRequest;
use fanout_notify_service::queue::NotificationQueue;
use fanout_notify_service::store::memory::{InMemoryNotificationStore, InMemoryPreferenceStore};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret";

/// Keeps queued requests instead of delivering them.
#[derive(Default)]
pub struct RecordingQueue {
    pub requests: Mutex<Vec<NotificationRequest>>,
}

#[async_trait]
impl NotificationQueue for RecordingQueue {
    async fn enqueue(&self, request: NotificationRequest) -> Result<(), Error> {
        self.requests.lock().await.push(request);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub notifications: InMemoryNotificationStore,
    pub preferences: InMemoryPreferenceStore,
    pub queue: Arc<RecordingQueue>,
    pub jwt: JwtConfig,
}

impl TestApp {
    pub fn new() -> Self {
        let queue = Arc::new(RecordingQueue::default());
        Self::with_parts(
            InMemoryNotificationStore::new(),
            InMemoryPreferenceStore::new(),
            queue.clone(),
            queue,
        )
    }

    pub fn with_parts(
        notifications: InMemoryNotificationStore,
        preferences: InMemoryPreferenceStore,
        queue: Arc<dyn NotificationQueue>,
        recording: Arc<RecordingQueue>,
    ) -> Self {
        let jwt = JwtConfig::new(JWT_SECRET);
        let state = AppState::new(
            Arc::new(notifications.clone()),
            Arc::new(preferences.clone()),
            queue,
            jwt.clone(),
            "test",
        );
        let (router, _) = api_router(state);
        Self {
            router,
            notifications,
            preferences,
            queue: recording,
            jwt,
        }
    }

    /// The application as served, middleware and rate limits included.
    /// Spawns limiter cleanup tasks, so it needs a runtime.
    pub fn served(config: &Config) -> Self {
        let mut app = Self::new();
        let state = AppState::new(
            Arc::new(app.notifications.clone()),
            Arc::new(app.preferences.clone()),
            app.queue.clone(),
            app.jwt.clone(),
            "test",
        );
        app.router = create_app(state, config).unwrap();
        app
    }

    pub fn token(&self, user_id: &str) -> String {
        self.jwt.generate_jwt(user_id, None, 3_600).unwrap()
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header("authorization", format!("Bearer {}", self.token(user_id)));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }
}

/// A parsed configuration for the served app; `extra` are further flags.
pub fn test_config(extra: &[&str]) -> Config {
    use clap::Parser;

    let mut args = vec![
        "fanout-notify-service",
        "--database-uri",
        "mongodb://localhost:27017",
        "--database-name",
        "notifications-test",
        "--jwt-secret-key",
        JWT_SECRET,
        "--redis-url",
        "redis://localhost:6379",
    ];
    args.extend_from_slice(extra);
    Config::try_parse_from(args).unwrap()
}
