use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;
use wither::Model as WitherModel;
use wither::bson::DateTime;
use wither::bson::oid::ObjectId;

use crate::enums::{Channel, DeliveryOutcome, NotificationStatus, Priority};
use crate::models::notification_request::NotificationRequest;
use crate::utils::models::ModelExt;

impl ModelExt for Notification {}

#[derive(Debug, Clone, Serialize, Deserialize, WitherModel, Validate, PartialEq)]
#[model(collection_name = "notifications")]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub r#type: String,
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime>,
    pub status: NotificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime>,
    #[serde(default)]
    pub delivered_channels: Vec<Channel>,
    #[serde(default)]
    pub delivery_results: Vec<ChannelDeliveryResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Outcome of one channel within a fan-out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDeliveryResult {
    pub channel: Channel,
    pub outcome: DeliveryOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelDeliveryResult {
    pub fn delivered(channel: Channel) -> Self {
        Self {
            channel,
            outcome: DeliveryOutcome::Delivered,
            error: None,
        }
    }

    pub fn failed(channel: Channel, error: impl Into<String>) -> Self {
        Self {
            channel,
            outcome: DeliveryOutcome::Failed,
            error: Some(error.into()),
        }
    }

    pub fn skipped(channel: Channel, reason: impl Into<String>) -> Self {
        Self {
            channel,
            outcome: DeliveryOutcome::Skipped,
            error: Some(reason.into()),
        }
    }

    /// Whether the channel adapter was actually invoked.
    pub fn was_attempted(&self) -> bool {
        self.outcome != DeliveryOutcome::Skipped
    }
}

/// Everything written to a record when it leaves `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub status: NotificationStatus,
    pub delivered_channels: Vec<Channel>,
    pub results: Vec<ChannelDeliveryResult>,
}

impl DeliveryReport {
    /// Every attempted channel succeeded (or nothing was attempted): `delivered`.
    /// Some attempted channels failed: `partially_delivered`. All failed: `failed`.
    pub fn from_results(results: Vec<ChannelDeliveryResult>) -> Self {
        let attempted: Vec<&ChannelDeliveryResult> =
            results.iter().filter(|r| r.was_attempted()).collect();
        let failures = attempted
            .iter()
            .filter(|r| r.outcome == DeliveryOutcome::Failed)
            .count();

        let status = if failures == 0 {
            NotificationStatus::Delivered
        } else if failures == attempted.len() {
            NotificationStatus::Failed
        } else {
            NotificationStatus::PartiallyDelivered
        };

        DeliveryReport {
            status,
            delivered_channels: attempted.iter().map(|r| r.channel).collect(),
            results,
        }
    }

    /// Report for a fan-out that could not be completed at all.
    pub fn aborted(results: Vec<ChannelDeliveryResult>) -> Self {
        DeliveryReport {
            status: NotificationStatus::Failed,
            delivered_channels: results
                .iter()
                .filter(|r| r.was_attempted())
                .map(|r| r.channel)
                .collect(),
            results,
        }
    }
}

impl Notification {
    /// Applies a terminal report. Returns `false` and leaves the record untouched
    /// when it already left `pending`.
    pub fn finalize(&mut self, report: &DeliveryReport, now: DateTime) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = report.status;
        self.delivered_channels = report.delivered_channels.clone();
        self.delivery_results = report.results.clone();
        if report.status.reached_recipient() {
            self.delivered_at = Some(now);
        }
        self.updated_at = now;
        true
    }

    /// Marks the record read; a second call keeps the first `readAt`.
    pub fn mark_read(&mut self, now: DateTime) {
        if !self.read {
            self.read = true;
            self.read_at = Some(now);
            self.updated_at = now;
        }
    }

    /// A fresh `pending` record for the given request.
    pub fn pending(request: &NotificationRequest) -> Self {
        let now = DateTime::now();
        Notification {
            id: None,
            user_id: request.user_id.clone(),
            r#type: request.r#type.clone(),
            title: request.title.clone(),
            message: request.message.clone(),
            data: request.data(),
            priority: request.priority(),
            read: false,
            read_at: None,
            status: NotificationStatus::Pending,
            delivered_at: None,
            delivered_channels: vec![],
            delivery_results: vec![],
            expires_at: request.expires_at.map(DateTime::from_chrono),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub fn is_expired(&self, now: DateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_record_copies_request_fields() {
        let mut data = Map::new();
        data.insert("trackId".to_string(), json!("t-1"));
        let request = NotificationRequest::new("u1", "track_like", "Liked", "Someone liked it")
            .with_data(data.clone());

        let notification = Notification::pending(&request);
        assert_eq!(notification.status, NotificationStatus::Pending);
        assert_eq!(notification.priority, Priority::Normal);
        assert_eq!(notification.data, data);
        assert!(!notification.read);
        assert!(notification.delivered_at.is_none());
        assert!(notification.validate().is_ok());
    }

    #[test]
    fn stored_document_uses_camel_case_keys() {
        let notification = Notification::pending(&NotificationRequest::new("u1", "x", "t", "m"));
        let document = wither::bson::to_document(&notification).unwrap();
        assert!(document.contains_key("userId"));
        assert!(document.contains_key("type"));
        assert!(document.contains_key("deliveredChannels"));
        assert!(!document.contains_key("_id"));
        assert!(!document.contains_key("readAt"));
        assert_eq!(document.get_str("status").unwrap(), "pending");
    }

    #[test]
    fn expiry_is_inclusive() {
        let mut notification =
            Notification::pending(&NotificationRequest::new("u1", "x", "t", "m"));
        let now = DateTime::now();
        assert!(!notification.is_expired(now));
        notification.expires_at = Some(now);
        assert!(notification.is_expired(now));
    }

    #[test]
    fn report_status_follows_attempted_outcomes() {
        let report = DeliveryReport::from_results(vec![
            ChannelDeliveryResult::delivered(Channel::App),
            ChannelDeliveryResult::skipped(Channel::Email, "no address"),
        ]);
        assert_eq!(report.status, NotificationStatus::Delivered);
        assert_eq!(report.delivered_channels, vec![Channel::App]);

        let report = DeliveryReport::from_results(vec![
            ChannelDeliveryResult::delivered(Channel::App),
            ChannelDeliveryResult::failed(Channel::Push, "gateway down"),
        ]);
        assert_eq!(report.status, NotificationStatus::PartiallyDelivered);
        assert_eq!(report.delivered_channels, vec![Channel::App, Channel::Push]);

        let report = DeliveryReport::from_results(vec![ChannelDeliveryResult::failed(
            Channel::Email,
            "smtp refused",
        )]);
        assert_eq!(report.status, NotificationStatus::Failed);

        let report = DeliveryReport::from_results(vec![]);
        assert_eq!(report.status, NotificationStatus::Delivered);
        assert!(report.delivered_channels.is_empty());
    }

    #[test]
    fn finalize_happens_once() {
        let mut notification =
            Notification::pending(&NotificationRequest::new("u1", "x", "t", "m"));
        let delivered =
            DeliveryReport::from_results(vec![ChannelDeliveryResult::delivered(Channel::App)]);
        let now = DateTime::now();

        assert!(notification.finalize(&delivered, now));
        assert_eq!(notification.status, NotificationStatus::Delivered);
        assert_eq!(notification.delivered_at, Some(now));

        let later = DateTime::from_millis(now.timestamp_millis() + 1_000);
        assert!(!notification.finalize(&DeliveryReport::aborted(vec![]), later));
        assert_eq!(notification.status, NotificationStatus::Delivered);
        assert_eq!(notification.delivered_at, Some(now));
    }

    #[test]
    fn failed_report_leaves_delivered_at_unset() {
        let mut notification =
            Notification::pending(&NotificationRequest::new("u1", "x", "t", "m"));
        notification.finalize(&DeliveryReport::aborted(vec![]), DateTime::now());
        assert_eq!(notification.status, NotificationStatus::Failed);
        assert!(notification.delivered_at.is_none());
    }

    #[test]
    fn mark_read_is_idempotent() {
        let mut notification =
            Notification::pending(&NotificationRequest::new("u1", "x", "t", "m"));
        let first = DateTime::now();
        notification.mark_read(first);
        notification.mark_read(DateTime::from_millis(first.timestamp_millis() + 5_000));
        assert!(notification.read);
        assert_eq!(notification.read_at, Some(first));
    }

    #[test]
    fn skipped_results_are_not_attempts() {
        assert!(!ChannelDeliveryResult::skipped(Channel::Email, "no address").was_attempted());
        assert!(ChannelDeliveryResult::failed(Channel::Push, "boom").was_attempted());
    }
}
