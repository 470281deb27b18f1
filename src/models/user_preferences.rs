use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;
use wither::Model as WitherModel;
use wither::bson::oid::ObjectId;
use wither::bson::{DateTime, Document, doc};

use crate::enums::{Channel, PushPlatform};
use crate::utils::models::ModelExt;

impl ModelExt for UserPreferences {}

#[derive(Debug, Clone, Serialize, Deserialize, WitherModel, Validate, PartialEq)]
#[model(collection_name = "user_preferences")]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub push_tokens: Vec<PushToken>,
    #[serde(default)]
    pub disabled_types: Vec<String>,
    #[serde(default)]
    pub channel_preferences: ChannelPreferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushToken {
    pub token: String,
    pub platform: PushPlatform,
    pub created_at: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelPreferences {
    pub email: ChannelSetting,
    pub push: ChannelSetting,
    pub app: ChannelSetting,
    pub websocket: ChannelSetting,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSetting {
    pub enabled: bool,
    pub disabled_types: Vec<String>,
}

impl Default for ChannelSetting {
    fn default() -> Self {
        ChannelSetting {
            enabled: true,
            disabled_types: vec![],
        }
    }
}

impl ChannelPreferences {
    pub fn get(&self, channel: Channel) -> &ChannelSetting {
        match channel {
            Channel::Email => &self.email,
            Channel::Push => &self.push,
            Channel::App => &self.app,
            Channel::Websocket => &self.websocket,
        }
    }

    fn get_mut(&mut self, channel: Channel) -> &mut ChannelSetting {
        match channel {
            Channel::Email => &mut self.email,
            Channel::Push => &mut self.push,
            Channel::App => &mut self.app,
            Channel::Websocket => &mut self.websocket,
        }
    }
}

impl ChannelSetting {
    pub fn allows(&self, notification_type: &str) -> bool {
        self.enabled && !self.disabled_types.iter().any(|t| t == notification_type)
    }
}

impl UserPreferences {
    /// Preferences of a user that never saved any: everything enabled, no endpoints.
    pub fn default_for(user_id: &str) -> Self {
        UserPreferences {
            id: None,
            user_id: user_id.to_string(),
            email: None,
            name: None,
            push_tokens: vec![],
            disabled_types: vec![],
            channel_preferences: ChannelPreferences::default(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Global mute: the notification is dropped before any record exists.
    pub fn is_type_muted(&self, notification_type: &str) -> bool {
        self.disabled_types.iter().any(|t| t == notification_type)
    }

    /// Requested channels the user accepts for this type, in request order.
    pub fn enabled_channels(&self, requested: &[Channel], notification_type: &str) -> Vec<Channel> {
        if self.is_type_muted(notification_type) {
            return vec![];
        }
        requested
            .iter()
            .copied()
            .filter(|channel| self.channel_preferences.get(*channel).allows(notification_type))
            .collect()
    }

    pub fn push_token_values(&self) -> Vec<String> {
        self.push_tokens.iter().map(|t| t.token.clone()).collect()
    }

    /// Registers a device token; re-registering the same token refreshes it in place.
    pub fn upsert_push_token(&mut self, token: &str, platform: PushPlatform, now: DateTime) {
        match self.push_tokens.iter_mut().find(|t| t.token == token) {
            Some(existing) => {
                existing.platform = platform;
                existing.last_used = Some(now);
            }
            None => self.push_tokens.push(PushToken {
                token: token.to_string(),
                platform,
                created_at: now,
                last_used: None,
            }),
        }
    }

    pub fn remove_push_token(&mut self, token: &str) -> bool {
        let before = self.push_tokens.len();
        self.push_tokens.retain(|t| t.token != token);
        self.push_tokens.len() != before
    }

    pub fn apply(&mut self, update: &PreferencesUpdate) {
        if let Some(email) = &update.email {
            self.email = Some(email.clone());
        }
        if let Some(name) = &update.name {
            self.name = Some(name.clone());
        }
        if let Some(disabled_types) = &update.disabled_types {
            self.disabled_types = dedup(disabled_types);
        }
        if let Some(channels) = &update.channel_preferences {
            for (channel, setting) in channels.entries() {
                let current = self.channel_preferences.get_mut(channel);
                if let Some(enabled) = setting.enabled {
                    current.enabled = enabled;
                }
                if let Some(disabled_types) = &setting.disabled_types {
                    current.disabled_types = dedup(disabled_types);
                }
            }
        }
    }
}

/// A partial preferences document.
///
/// Merge rules: `email`, `name` and `disabledTypes` replace the stored value
/// when present. `channelPreferences` is merged channel by channel and field by
/// field, so `{"channelPreferences": {"email": {"enabled": false}}}` keeps the
/// email channel's disabled types and every other channel untouched. Unknown
/// keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreferencesUpdate {
    #[validate(email)]
    pub email: Option<String>,
    pub name: Option<String>,
    pub disabled_types: Option<Vec<String>>,
    pub channel_preferences: Option<ChannelPreferencesUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChannelPreferencesUpdate {
    pub email: Option<ChannelSettingUpdate>,
    pub push: Option<ChannelSettingUpdate>,
    pub app: Option<ChannelSettingUpdate>,
    pub websocket: Option<ChannelSettingUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChannelSettingUpdate {
    pub enabled: Option<bool>,
    pub disabled_types: Option<Vec<String>>,
}

impl ChannelPreferencesUpdate {
    fn entries(&self) -> impl Iterator<Item = (Channel, &ChannelSettingUpdate)> {
        [
            (Channel::Email, self.email.as_ref()),
            (Channel::Push, self.push.as_ref()),
            (Channel::App, self.app.as_ref()),
            (Channel::Websocket, self.websocket.as_ref()),
        ]
        .into_iter()
        .filter_map(|(channel, setting)| setting.map(|s| (channel, s)))
    }
}

impl PreferencesUpdate {
    pub fn is_empty(&self) -> bool {
        self.set_document().is_empty()
    }

    /// `$set` paths for the update, one dotted path per merged field.
    pub fn set_document(&self) -> Document {
        let mut set = doc! {};
        if let Some(email) = &self.email {
            set.insert("email", email.clone());
        }
        if let Some(name) = &self.name {
            set.insert("name", name.clone());
        }
        if let Some(disabled_types) = &self.disabled_types {
            set.insert("disabledTypes", dedup(disabled_types));
        }
        if let Some(channels) = &self.channel_preferences {
            for (channel, setting) in channels.entries() {
                if let Some(enabled) = setting.enabled {
                    set.insert(format!("channelPreferences.{channel}.enabled"), enabled);
                }
                if let Some(disabled_types) = &setting.disabled_types {
                    set.insert(
                        format!("channelPreferences.{channel}.disabledTypes"),
                        dedup(disabled_types),
                    );
                }
            }
        }
        set
    }
}

fn dedup(values: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(value) {
            unique.push(value.clone());
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> PreferencesUpdate {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_enable_every_channel() {
        let prefs = UserPreferences::default_for("u1");
        assert_eq!(
            prefs.enabled_channels(&[Channel::App, Channel::Email, Channel::Websocket], "x"),
            vec![Channel::App, Channel::Email, Channel::Websocket]
        );
        assert!(prefs.email.is_none());
        assert!(prefs.push_tokens.is_empty());
    }

    #[test]
    fn missing_stored_fields_deserialize_to_defaults() {
        let document = doc! {
            "userId": "u1",
            "channelPreferences": { "email": { "enabled": false } },
        };
        let prefs: UserPreferences = wither::bson::from_document(document).unwrap();
        assert!(!prefs.channel_preferences.email.enabled);
        assert!(prefs.channel_preferences.push.enabled);
        assert!(prefs.channel_preferences.email.disabled_types.is_empty());
    }

    #[test]
    fn per_channel_type_exclusion_only_drops_that_channel() {
        let mut prefs = UserPreferences::default_for("u1");
        prefs.apply(&update(
            r#"{"channelPreferences":{"email":{"disabledTypes":["track_comment"]}}}"#,
        ));
        assert_eq!(
            prefs.enabled_channels(&[Channel::Email, Channel::Push], "track_comment"),
            vec![Channel::Push]
        );
        assert_eq!(
            prefs.enabled_channels(&[Channel::Email, Channel::Push], "track_like"),
            vec![Channel::Email, Channel::Push]
        );
    }

    #[test]
    fn global_mute_drops_every_channel() {
        let mut prefs = UserPreferences::default_for("u1");
        prefs.apply(&update(r#"{"disabledTypes":["artist_update"]}"#));
        assert!(prefs.is_type_muted("artist_update"));
        assert!(prefs.enabled_channels(&[Channel::App], "artist_update").is_empty());
    }

    #[test]
    fn channel_merge_overlays_instead_of_replacing() {
        let mut prefs = UserPreferences::default_for("u1");
        prefs.apply(&update(
            r#"{"channelPreferences":{"email":{"disabledTypes":["a"]},"push":{"enabled":false}}}"#,
        ));
        prefs.apply(&update(r#"{"channelPreferences":{"email":{"enabled":false}}}"#));

        assert!(!prefs.channel_preferences.email.enabled);
        assert_eq!(prefs.channel_preferences.email.disabled_types, vec!["a"]);
        assert!(!prefs.channel_preferences.push.enabled);
        assert!(prefs.channel_preferences.app.enabled);
    }

    #[test]
    fn top_level_lists_replace_and_dedup() {
        let mut prefs = UserPreferences::default_for("u1");
        prefs.apply(&update(r#"{"disabledTypes":["a","b"]}"#));
        prefs.apply(&update(r#"{"disabledTypes":["c","c"],"name":"Ada"}"#));
        assert_eq!(prefs.disabled_types, vec!["c"]);
        assert_eq!(prefs.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn set_document_uses_dotted_paths() {
        let set = update(
            r#"{"email":"a@b.io","channelPreferences":{"websocket":{"enabled":false,"disabledTypes":["x"]}}}"#,
        )
        .set_document();
        assert_eq!(set.get_str("email").unwrap(), "a@b.io");
        assert!(!set.get_bool("channelPreferences.websocket.enabled").unwrap());
        assert_eq!(
            set.get_array("channelPreferences.websocket.disabledTypes").unwrap().len(),
            1
        );
        assert!(!set.contains_key("channelPreferences"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<PreferencesUpdate, _> =
            serde_json::from_str(r#"{"pushTokens":[{"token":"t"}]}"#);
        assert!(result.is_err());

        let result: Result<PreferencesUpdate, _> =
            serde_json::from_str(r#"{"channelPreferences":{"sms":{"enabled":false}}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(update("{}").is_empty());
        assert!(update(r#"{"channelPreferences":{}}"#).is_empty());
        assert!(!update(r#"{"name":"x"}"#).is_empty());
    }

    #[test]
    fn push_token_registration_is_keyed_by_token() {
        let mut prefs = UserPreferences::default_for("u1");
        let now = DateTime::now();
        prefs.upsert_push_token("tok-1", PushPlatform::Ios, now);
        prefs.upsert_push_token("tok-2", PushPlatform::Web, now);
        prefs.upsert_push_token("tok-1", PushPlatform::Android, now);

        assert_eq!(prefs.push_token_values(), vec!["tok-1", "tok-2"]);
        assert_eq!(prefs.push_tokens[0].platform, PushPlatform::Android);
        assert!(prefs.push_tokens[0].last_used.is_some());

        assert!(prefs.remove_push_token("tok-1"));
        assert!(!prefs.remove_push_token("tok-1"));
        assert_eq!(prefs.push_token_values(), vec!["tok-2"]);
    }
}
