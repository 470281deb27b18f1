use std::sync::Arc;

use axum::extract::FromRef;

use crate::core::jwt_auth::jwt_auth::JwtConfig;
use crate::queue::NotificationQueue;
use crate::store::{NotificationStore, PreferenceStore};

#[derive(Clone)]
pub struct AppState {
    pub notifications: Arc<dyn NotificationStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub queue: Arc<dyn NotificationQueue>,
    pub jwt: JwtConfig,
    pub app_env: String,
}

impl AppState {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        preferences: Arc<dyn PreferenceStore>,
        queue: Arc<dyn NotificationQueue>,
        jwt: JwtConfig,
        app_env: &str,
    ) -> Self {
        Self {
            notifications,
            preferences,
            queue,
            jwt,
            app_env: app_env.to_string(),
        }
    }
}

impl FromRef<AppState> for JwtConfig {
    fn from_ref(app_state: &AppState) -> JwtConfig {
        app_state.jwt.clone()
    }
}
