use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use futures::future::{BoxFuture, join_all};

use crate::adapters::{
    DeliveryError, EmailAdapter, EmailMessage, PushAdapter, PushMessage, WebsocketAdapter,
    WebsocketPayload,
};
use crate::enums::Channel;
use crate::errors::Error;
use crate::fanout::template::{email_template, render_body, render_subject, template_context};
use crate::models::notification::{ChannelDeliveryResult, DeliveryReport, Notification};
use crate::models::notification_request::NotificationRequest;
use crate::models::user_preferences::UserPreferences;
use crate::store::{NotificationStore, PreferenceStore};

#[derive(Debug, Clone)]
pub struct FanOutConfig {
    pub product_name: String,
    /// Upper bound for one adapter call.
    pub adapter_timeout: Duration,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            product_name: "SoundScape-AI".to_string(),
            adapter_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FanOutOutcome {
    /// The type is globally muted by the user; nothing was stored or sent.
    Muted,
    Completed(Notification),
}

type DeliveryJob = BoxFuture<'static, Result<(), DeliveryError>>;

/// Resolves channels against preferences, delivers concurrently and records
/// the per-channel outcome on the notification.
#[derive(Clone)]
pub struct FanOutEngine {
    notifications: Arc<dyn NotificationStore>,
    preferences: Arc<dyn PreferenceStore>,
    email: Arc<dyn EmailAdapter>,
    push: Arc<dyn PushAdapter>,
    websocket: Arc<dyn WebsocketAdapter>,
    config: Arc<FanOutConfig>,
}

impl FanOutEngine {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        preferences: Arc<dyn PreferenceStore>,
        email: Arc<dyn EmailAdapter>,
        push: Arc<dyn PushAdapter>,
        websocket: Arc<dyn WebsocketAdapter>,
        config: FanOutConfig,
    ) -> Self {
        Self {
            notifications,
            preferences,
            email,
            push,
            websocket,
            config: Arc::new(config),
        }
    }

    /// Runs one fan-out. Errors mean the pipeline itself failed (store
    /// unavailable) and the request may be retried; adapter failures are
    /// recorded on the notification instead.
    pub async fn process(&self, request: &NotificationRequest) -> Result<FanOutOutcome, Error> {
        let user_id = request.user_id.as_str();
        let preferences = self.preferences.get_preferences(user_id).await?;

        if preferences.is_type_muted(&request.r#type) {
            tracing::info!(
                user_id = %user_id,
                notification_type = %request.r#type,
                "user muted notification type, dropping"
            );
            return Ok(FanOutOutcome::Muted);
        }

        let notification = self
            .notifications
            .create(Notification::pending(request))
            .await?;
        let Some(id) = notification.id else {
            return Err(Error::internal_err("Created notification has no id"));
        };

        let requested = request.requested_channels();
        let enabled = preferences.enabled_channels(&requested, &request.r#type);

        let dispatches = requested.iter().map(|channel| {
            let channel = *channel;
            let job = if enabled.contains(&channel) {
                self.delivery_job(channel, &notification, &preferences)
            } else {
                Err("disabled by user preferences".to_string())
            };
            self.run_job(channel, &notification, job)
        });
        let results = join_all(dispatches).await;

        let report = DeliveryReport::from_results(results);
        match self.notifications.finalize(&id, &report).await {
            Ok(finalized) => {
                tracing::info!(
                    user_id = %user_id,
                    notification_id = %id,
                    status = %finalized.status,
                    channels = ?finalized.delivered_channels,
                    "notification fan-out finished"
                );
                Ok(FanOutOutcome::Completed(finalized))
            }
            Err(e) => {
                let aborted = DeliveryReport::aborted(report.results);
                if let Err(mark_err) = self.notifications.finalize(&id, &aborted).await {
                    tracing::error!(
                        notification_id = %id,
                        "could not mark notification failed: {mark_err}"
                    );
                }
                Err(e)
            }
        }
    }

    /// The adapter call for one enabled channel, or the reason it is skipped.
    fn delivery_job(
        &self,
        channel: Channel,
        notification: &Notification,
        preferences: &UserPreferences,
    ) -> Result<DeliveryJob, String> {
        match channel {
            Channel::App => Ok(Box::pin(async { Ok(()) })),
            Channel::Email => {
                let Some(to) = preferences.email.clone() else {
                    return Err("no email address on file".to_string());
                };
                let template = email_template(&notification.r#type);
                let context = template_context(
                    &notification.title,
                    &notification.message,
                    &notification.data,
                    preferences.name.as_deref(),
                );
                let message = EmailMessage {
                    to,
                    subject: render_subject(&template, &self.config.product_name),
                    html: render_body(&template, &context),
                };
                let adapter = self.email.clone();
                Ok(Box::pin(async move { adapter.send_email(message).await }))
            }
            Channel::Push => {
                let tokens = preferences.push_token_values();
                if tokens.is_empty() {
                    return Err("no push tokens registered".to_string());
                }
                let message = PushMessage {
                    tokens,
                    title: notification.title.clone(),
                    body: notification.message.clone(),
                    data: notification.data.clone(),
                };
                let adapter = self.push.clone();
                Ok(Box::pin(async move {
                    adapter.send_push_notification(message).await
                }))
            }
            Channel::Websocket => {
                let payload = WebsocketPayload {
                    r#type: "notification".to_string(),
                    notification_id: notification.id_hex(),
                    title: notification.title.clone(),
                    message: notification.message.clone(),
                    data: notification.data.clone(),
                    timestamp: notification
                        .created_at
                        .to_chrono()
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                };
                let user_id = notification.user_id.clone();
                let adapter = self.websocket.clone();
                Ok(Box::pin(async move {
                    adapter.send_to_user(&user_id, payload).await
                }))
            }
        }
    }

    /// Runs the job on its own task so a panic or a hung transport only
    /// fails this channel.
    async fn run_job(
        &self,
        channel: Channel,
        notification: &Notification,
        job: Result<DeliveryJob, String>,
    ) -> ChannelDeliveryResult {
        let job = match job {
            Ok(job) => job,
            Err(reason) => return ChannelDeliveryResult::skipped(channel, reason),
        };

        let timeout = self.config.adapter_timeout;
        let outcome = tokio::spawn(tokio::time::timeout(timeout, job)).await;

        let result = match outcome {
            Ok(Ok(Ok(()))) => ChannelDeliveryResult::delivered(channel),
            Ok(Ok(Err(e))) => ChannelDeliveryResult::failed(channel, e.to_string()),
            Ok(Err(_)) => ChannelDeliveryResult::failed(
                channel,
                format!("timed out after {} ms", timeout.as_millis()),
            ),
            Err(e) => ChannelDeliveryResult::failed(channel, format!("delivery task failed: {e}")),
        };

        if let Some(error) = result.error.as_deref().filter(|_| result.was_attempted()) {
            tracing::warn!(
                user_id = %notification.user_id,
                notification_id = %notification.id_hex(),
                channel = %channel,
                "channel delivery failed: {error}"
            );
        }
        result
    }
}
