//! Delivery adapters: one transport per channel, each delivering one message
//! to one recipient. The in-app channel has no adapter; its delivery is the
//! stored record itself.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

pub mod email;
pub mod push;
pub mod websocket;

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("{0} delivery is not configured")]
    NotConfigured(&'static str),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by provider: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    pub data: Map<String, Value>,
}

/// Event pushed to the user's live sockets.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebsocketPayload {
    pub r#type: String,
    pub notification_id: String,
    pub title: String,
    pub message: String,
    pub data: Map<String, Value>,
    /// RFC 3339 creation time of the record.
    pub timestamp: String,
}

#[async_trait]
pub trait EmailAdapter: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait PushAdapter: Send + Sync {
    /// Succeeds when at least one token accepted the message.
    async fn send_push_notification(&self, message: PushMessage) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait WebsocketAdapter: Send + Sync {
    async fn send_to_user(
        &self,
        user_id: &str,
        payload: WebsocketPayload,
    ) -> Result<(), DeliveryError>;
}

/// Stand-in for a transport whose credentials are not configured. Every call
/// fails, so the channel shows up as `failed` on the record.
#[derive(Debug, Clone, Copy)]
pub struct UnconfiguredAdapter;

#[async_trait]
impl EmailAdapter for UnconfiguredAdapter {
    async fn send_email(&self, _message: EmailMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured("email"))
    }
}

#[async_trait]
impl PushAdapter for UnconfiguredAdapter {
    async fn send_push_notification(&self, _message: PushMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured("push"))
    }
}
