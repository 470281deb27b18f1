use async_trait::async_trait;

use crate::adapters::{DeliveryError, WebsocketAdapter, WebsocketPayload};
use crate::core::cache::redis_emitter::RedisEmitter;

pub const NOTIFICATION_EVENT: &str = "notification";

pub fn user_room(user_id: &str) -> String {
    format!("notification:user:{user_id}")
}

/// Emits through the Socket.IO Redis adapter to the user's room.
pub struct SocketIoWebsocketAdapter {
    emitter: RedisEmitter,
}

impl SocketIoWebsocketAdapter {
    pub fn new(emitter: RedisEmitter) -> Self {
        Self { emitter }
    }
}

#[async_trait]
impl WebsocketAdapter for SocketIoWebsocketAdapter {
    async fn send_to_user(
        &self,
        user_id: &str,
        payload: WebsocketPayload,
    ) -> Result<(), DeliveryError> {
        let data =
            serde_json::to_string(&payload).map_err(|e| DeliveryError::Build(e.to_string()))?;
        let room = user_room(user_id);
        let emitter = self.emitter.clone();

        tokio::task::spawn_blocking(move || emitter.emit_room(&room, NOTIFICATION_EVENT, &data))
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
            .map_err(DeliveryError::Transport)
    }
}
