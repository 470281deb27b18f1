use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::errors::Error;
use crate::models::notification_request::NotificationRequest;
use crate::queue::NotificationQueue;
use crate::queue::worker::DispatchWorker;

/// Bounded in-process queue. A drain task hands every request to its own
/// worker task, so fan-outs run concurrently and in no particular order.
/// A full queue rejects new requests instead of holding the caller.
#[derive(Clone)]
pub struct LocalNotificationQueue {
    sender: mpsc::Sender<NotificationRequest>,
}

impl LocalNotificationQueue {
    pub fn start(worker: DispatchWorker, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<NotificationRequest>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let worker = worker.clone();
                tokio::spawn(async move {
                    let user_id = request.user_id.clone();
                    if let Err(e) = worker.handle(request).await {
                        tracing::error!(user_id = %user_id, "failed to dead-letter notification: {e:?}");
                    }
                });
            }
            tracing::info!("local notification queue closed");
        });

        (Self { sender }, handle)
    }
}

#[async_trait]
impl NotificationQueue for LocalNotificationQueue {
    async fn enqueue(&self, request: NotificationRequest) -> Result<(), Error> {
        self.sender.try_send(request).map_err(|e| match e {
            TrySendError::Full(request) => {
                tracing::warn!(user_id = %request.user_id, "local notification queue is full");
                Error::QueueFull
            }
            TrySendError::Closed(_) => Error::QueueClosed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DeliveryError, UnconfiguredAdapter, WebsocketAdapter, WebsocketPayload};
    use crate::enums::NotificationStatus;
    use crate::fanout::{FanOutConfig, FanOutEngine};
    use crate::queue::worker::{LogDeadLetterSink, RetryPolicy};
    use crate::store::memory::{InMemoryNotificationStore, InMemoryPreferenceStore};
    use crate::store::{NotificationFilter, NotificationStore};
    use std::sync::Arc;
    use std::time::Duration;

    struct NoopSocket;

    #[async_trait]
    impl WebsocketAdapter for NoopSocket {
        async fn send_to_user(&self, _: &str, _: WebsocketPayload) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn enqueued_requests_are_fanned_out() {
        let records = InMemoryNotificationStore::new();
        let engine = FanOutEngine::new(
            Arc::new(records.clone()),
            Arc::new(InMemoryPreferenceStore::new()),
            Arc::new(UnconfiguredAdapter),
            Arc::new(UnconfiguredAdapter),
            Arc::new(NoopSocket),
            FanOutConfig::default(),
        );
        let worker = DispatchWorker::new(engine, RetryPolicy::default(), Arc::new(LogDeadLetterSink));
        let (queue, _handle) = LocalNotificationQueue::start(worker, 8);

        for i in 0..3 {
            queue
                .enqueue(NotificationRequest::new("u1", "x", &format!("t{i}"), "m"))
                .await
                .unwrap();
        }

        let mut delivered = 0;
        for _ in 0..100 {
            let page = records
                .find_by_user("u1", &NotificationFilter::default())
                .await
                .unwrap();
            delivered = page
                .items
                .iter()
                .filter(|n| n.status == NotificationStatus::Delivered)
                .count();
            if delivered == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(delivered, 3);
    }

    #[tokio::test]
    async fn closed_queue_rejects_requests() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let queue = LocalNotificationQueue { sender };
        let result = queue
            .enqueue(NotificationRequest::new("u1", "x", "t", "m"))
            .await;
        assert!(matches!(result, Err(Error::QueueClosed)));
    }

    #[tokio::test]
    async fn full_queue_answers_immediately() {
        let (sender, mut receiver) = mpsc::channel(1);
        let queue = LocalNotificationQueue { sender };

        queue
            .enqueue(NotificationRequest::new("u1", "x", "t1", "m"))
            .await
            .unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            queue.enqueue(NotificationRequest::new("u1", "x", "t2", "m")),
        )
        .await
        .expect("enqueue waited for room");
        assert!(matches!(result, Err(Error::QueueFull)));
        assert_eq!(Error::QueueFull.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(receiver.recv().await.unwrap().title, "t1");
        queue
            .enqueue(NotificationRequest::new("u1", "x", "t3", "m"))
            .await
            .unwrap();
    }
}
