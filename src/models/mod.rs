pub mod notification;
pub mod notification_request;
pub mod user_preferences;
