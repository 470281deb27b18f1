use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::errors::Error;
use crate::fanout::{FanOutEngine, FanOutOutcome};
use crate::models::notification_request::NotificationRequest;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Whole fan-out retries: delays of `base * 2^n` with full jitter, capped at 30s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let base_ms = (self.base_delay.as_millis() as u64).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(base_ms)
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(self.max_retries)
    }
}

/// Where requests go once every retry failed.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn dead_letter(&self, request: &NotificationRequest, error: &Error)
    -> anyhow::Result<()>;
}

/// Dead letters are only logged; used by the in-process queue.
pub struct LogDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LogDeadLetterSink {
    async fn dead_letter(
        &self,
        request: &NotificationRequest,
        error: &Error,
    ) -> anyhow::Result<()> {
        tracing::error!(
            user_id = %request.user_id,
            notification_type = %request.r#type,
            request = ?request,
            "dead letter: notification dropped after retries: {error}"
        );
        Ok(())
    }
}

/// Runs queued requests through the engine with retries and dead-lettering.
#[derive(Clone)]
pub struct DispatchWorker {
    engine: FanOutEngine,
    retry: RetryPolicy,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl DispatchWorker {
    pub fn new(
        engine: FanOutEngine,
        retry: RetryPolicy,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            engine,
            retry,
            dead_letters,
        }
    }

    /// Errors only when the request could neither be delivered nor
    /// dead-lettered, so the caller must not acknowledge it.
    pub async fn handle(&self, request: NotificationRequest) -> anyhow::Result<()> {
        let mut attempt = 0usize;
        let result = Retry::spawn(self.retry.delays(), || {
            attempt += 1;
            let engine = self.engine.clone();
            let request = request.clone();
            let attempt = attempt;
            async move {
                engine.process(&request).await.inspect_err(|e| {
                    tracing::warn!(
                        user_id = %request.user_id,
                        attempt,
                        "notification fan-out failed: {e}"
                    );
                })
            }
        })
        .await;

        match result {
            Ok(FanOutOutcome::Completed(_)) | Ok(FanOutOutcome::Muted) => Ok(()),
            Err(e) => self.dead_letters.dead_letter(&request, &e).await,
        }
    }
}
