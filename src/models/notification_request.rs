use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use validator::Validate;

use crate::enums::{Channel, Priority};

/// A request to notify one user; the ingress body and the queued payload.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub user_id: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    #[schema(example = "new_follower")]
    pub r#type: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub title: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub message: String,

    #[schema(value_type = Option<Object>)]
    pub data: Option<Map<String, Value>>,

    /// Candidate channels, intersected with the user's preferences.
    pub channels: Option<Vec<Channel>>,

    pub priority: Option<Priority>,

    pub expires_at: Option<DateTime<Utc>>,
}

impl NotificationRequest {
    pub fn new(user_id: &str, r#type: &str, title: &str, message: &str) -> Self {
        NotificationRequest {
            user_id: user_id.to_string(),
            r#type: r#type.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            ..Default::default()
        }
    }

    pub fn with_channels(mut self, channels: &[Channel]) -> Self {
        self.channels = Some(channels.to_vec());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Requested channels in order, duplicates dropped.
    pub fn requested_channels(&self) -> Vec<Channel> {
        let channels = self.channels.clone().unwrap_or_else(Channel::defaults);
        let mut unique = Vec::with_capacity(channels.len());
        for channel in channels {
            if !unique.contains(&channel) {
                unique.push(channel);
            }
        }
        unique
    }

    pub fn data(&self) -> Map<String, Value> {
        self.data.clone().unwrap_or_default()
    }

    pub fn priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_channels_fall_back_to_app_email_push() {
        let request: NotificationRequest = serde_json::from_str(
            r#"{"userId":"u1","type":"track_like","title":"t","message":"m"}"#,
        )
        .unwrap();
        assert_eq!(
            request.requested_channels(),
            vec![Channel::App, Channel::Email, Channel::Push]
        );
        assert_eq!(request.priority(), Priority::Normal);
        assert!(request.data().is_empty());
    }

    #[test]
    fn null_optionals_are_accepted() {
        let request: NotificationRequest = serde_json::from_str(
            r#"{"userId":"u1","type":"x","title":"t","message":"m","channels":null,"data":null}"#,
        )
        .unwrap();
        assert_eq!(request.requested_channels().len(), 3);
    }

    #[test]
    fn duplicate_channels_collapse_in_order() {
        let request = NotificationRequest::new("u1", "x", "t", "m").with_channels(&[
            Channel::Push,
            Channel::App,
            Channel::Push,
        ]);
        assert_eq!(request.requested_channels(), vec![Channel::Push, Channel::App]);
    }

    #[test]
    fn missing_required_fields_fail_validation() {
        let request: NotificationRequest =
            serde_json::from_str(r#"{"userId":"u1","title":"t","message":"m"}"#).unwrap();
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 1);
    }
}
