use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;
use wither::bson::DateTime;

use crate::enums::{Channel, DeliveryOutcome, NotificationStatus, Priority, PushPlatform};
use crate::models::notification::{ChannelDeliveryResult, Notification};
use crate::models::user_preferences::{ChannelPreferences, PushToken, UserPreferences};
use crate::utils::pagination::{PaginationMeta, PaginationQuery};

fn rfc3339(value: DateTime) -> String {
    value.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponseDto {
    pub message: String,
}

impl MessageResponseDto {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: String,
    pub user_id: String,
    pub r#type: String,
    pub title: String,
    pub message: String,
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,
    pub priority: Priority,
    pub read: bool,
    pub read_at: Option<String>,
    pub status: NotificationStatus,
    pub delivered_at: Option<String>,
    pub delivered_channels: Vec<Channel>,
    pub delivery_results: Vec<DeliveryResultDto>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryResultDto {
    pub channel: Channel,
    pub outcome: DeliveryOutcome,
    pub error: Option<String>,
}

impl From<ChannelDeliveryResult> for DeliveryResultDto {
    fn from(result: ChannelDeliveryResult) -> Self {
        Self {
            channel: result.channel,
            outcome: result.outcome,
            error: result.error,
        }
    }
}

impl From<Notification> for NotificationDto {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id_hex(),
            user_id: notification.user_id,
            r#type: notification.r#type,
            title: notification.title,
            message: notification.message,
            data: notification.data,
            priority: notification.priority,
            read: notification.read,
            read_at: notification.read_at.map(rfc3339),
            status: notification.status,
            delivered_at: notification.delivered_at.map(rfc3339),
            delivered_channels: notification.delivered_channels,
            delivery_results: notification
                .delivery_results
                .into_iter()
                .map(DeliveryResultDto::from)
                .collect(),
            expires_at: notification.expires_at.map(rfc3339),
            created_at: rfc3339(notification.created_at),
            updated_at: rfc3339(notification.updated_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ListNotificationsQuery {
    /// 1-based page, defaults to 1
    pub page: Option<u32>,
    /// Page size, defaults to 20, at most 100
    pub limit: Option<u32>,
    /// Only unread notifications when `true`
    pub unread: Option<bool>,
}

impl ListNotificationsQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationListDto {
    pub notifications: Vec<NotificationDto>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponseDto {
    pub message: String,
    pub modified_count: u64,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushTokenDto {
    pub token: String,
    pub platform: PushPlatform,
    pub created_at: String,
    pub last_used: Option<String>,
}

impl From<PushToken> for PushTokenDto {
    fn from(token: PushToken) -> Self {
        Self {
            token: token.token,
            platform: token.platform,
            created_at: rfc3339(token.created_at),
            last_used: token.last_used.map(rfc3339),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesDto {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub disabled_types: Vec<String>,
    pub channel_preferences: ChannelPreferences,
    pub push_tokens: Vec<PushTokenDto>,
}

impl From<UserPreferences> for PreferencesDto {
    fn from(preferences: UserPreferences) -> Self {
        Self {
            user_id: preferences.user_id,
            email: preferences.email,
            name: preferences.name,
            disabled_types: preferences.disabled_types,
            channel_preferences: preferences.channel_preferences,
            push_tokens: preferences
                .push_tokens
                .into_iter()
                .map(PushTokenDto::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePreferencesResponseDto {
    pub message: String,
    pub preferences: PreferencesDto,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterPushTokenRequestDto {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(required)]
    pub platform: Option<PushPlatform>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RemovePushTokenRequestDto {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemovePushTokenResponseDto {
    pub message: String,
    pub removed: bool,
}
