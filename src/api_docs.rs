use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::HttpAuthScheme;
use utoipa::openapi::security::HttpBuilder;
use utoipa::openapi::security::SecurityScheme;

use crate::enums::{Channel, DeliveryOutcome, NotificationStatus, Priority, PushPlatform};
use crate::models::notification_request::NotificationRequest;
use crate::models::user_preferences::{
    ChannelPreferences, ChannelPreferencesUpdate, ChannelSetting, ChannelSettingUpdate,
    PreferencesUpdate,
};
use crate::routes::notification::dto::{
    DeliveryResultDto, MarkAllReadResponseDto, MessageResponseDto, NotificationDto,
    NotificationListDto, PreferencesDto, PushTokenDto, RegisterPushTokenRequestDto,
    RemovePushTokenRequestDto, RemovePushTokenResponseDto, UpdatePreferencesResponseDto,
};
use crate::utils::pagination::PaginationMeta;

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityModifier),
    servers((url = "/")),
    components(
        schemas(
            // Ingress
            NotificationRequest,
            MessageResponseDto,

            // Notification DTOs
            NotificationDto,
            DeliveryResultDto,
            NotificationListDto,
            MarkAllReadResponseDto,
            PaginationMeta,

            // Preferences
            PreferencesDto,
            PushTokenDto,
            PreferencesUpdate,
            ChannelPreferences,
            ChannelSetting,
            ChannelPreferencesUpdate,
            ChannelSettingUpdate,
            UpdatePreferencesResponseDto,
            RegisterPushTokenRequestDto,
            RemovePushTokenRequestDto,
            RemovePushTokenResponseDto,

            // Enums
            Channel,
            Priority,
            NotificationStatus,
            DeliveryOutcome,
            PushPlatform,
        )
    ),
    tags(
        (name = "Notification APIs", description = "Notification ingress, inbox and preference endpoints"),
        (name = "Health", description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;

struct SecurityModifier;
impl Modify for SecurityModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let Some(components) = openapi.components.as_mut() else {
            return;
        };
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_declares_bearer_auth() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("NotificationRequest"));
    }
}
