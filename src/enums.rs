use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, VariantNames};
use utoipa::ToSchema;

#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    EnumString,
    VariantNames,
    Display,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    App,
    Email,
    Push,
    Websocket,
}

impl Channel {
    /// Channels used when a request does not name any.
    pub fn defaults() -> Vec<Channel> {
        vec![Channel::App, Channel::Email, Channel::Push]
    }
}

#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Default,
    EnumString,
    VariantNames,
    Display,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, EnumString, Display, PartialEq, Eq, Hash, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Delivered,
    PartiallyDelivered,
    Failed,
}

impl NotificationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NotificationStatus::Pending)
    }

    /// Whether at least one channel reached the recipient.
    pub fn reached_recipient(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Delivered | NotificationStatus::PartiallyDelivered
        )
    }
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, EnumString, Display, PartialEq, Eq, Hash, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
    Skipped,
}

#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    EnumString,
    VariantNames,
    Display,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PushPlatform {
    Ios,
    Android,
    Web,
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, EnumString, VariantNames, Display, PartialEq, Eq, Hash,
)]
pub enum KafkaTopic {
    #[strum(serialize = "soundscape.notification.ingress")]
    NotificationIngress,
    #[strum(serialize = "soundscape.notification.dead-letter")]
    NotificationDeadLetter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn channel_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Channel::Websocket).unwrap(), "\"websocket\"");
        assert_eq!(Channel::from_str("push").unwrap(), Channel::Push);
        assert!(Channel::from_str("sms").is_err());
    }

    #[test]
    fn status_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotificationStatus::PartiallyDelivered).unwrap(),
            "\"partially_delivered\""
        );
        assert_eq!(NotificationStatus::Pending.to_string(), "pending");
        assert!(!NotificationStatus::Pending.is_terminal());
        assert!(NotificationStatus::Failed.is_terminal());
        assert!(!NotificationStatus::Failed.reached_recipient());
    }

    #[test]
    fn priority_defaults_to_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn kafka_topic_names() {
        assert_eq!(
            KafkaTopic::NotificationIngress.to_string(),
            "soundscape.notification.ingress"
        );
    }
}
