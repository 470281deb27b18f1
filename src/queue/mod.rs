//! Ingress queue: decouples the `202 Accepted` HTTP call from delivery.

use async_trait::async_trait;

use crate::errors::Error;
use crate::models::notification_request::NotificationRequest;

pub mod kafka;
pub mod local;
pub mod worker;

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Returns once the request is durably accepted by the backend.
    async fn enqueue(&self, request: NotificationRequest) -> Result<(), Error>;
}
