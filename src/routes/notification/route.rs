use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum_extra::extract::WithRejection;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use validator::Validate;
use wither::bson::oid::ObjectId;

use crate::app_state::AppState;
use crate::core::jwt_auth::jwt_auth::JwtAuth;
use crate::errors::Error;
use crate::models::notification_request::NotificationRequest;
use crate::models::user_preferences::PreferencesUpdate;
use crate::routes::notification::dto::{
    ListNotificationsQuery, MarkAllReadResponseDto, MessageResponseDto, NotificationDto,
    NotificationListDto, PreferencesDto, RegisterPushTokenRequestDto, RemovePushTokenRequestDto,
    RemovePushTokenResponseDto, UpdatePreferencesResponseDto,
};
use crate::store::{NotificationFilter, notification_not_found};

/// Service-to-service ingress.
pub fn create_ingress_route() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(send_notification))
}

/// Inbox, preferences and push tokens of the bearer's user.
pub fn create_route() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_notifications))
        .routes(routes!(mark_all_read))
        .routes(routes!(get_preferences, update_preferences))
        .routes(routes!(register_push_token, remove_push_token))
        .routes(routes!(get_notification, delete_notification))
        .routes(routes!(mark_read))
}

fn parse_notification_id(id: &str) -> Result<ObjectId, Error> {
    ObjectId::parse_str(id).map_err(|_| Error::ParseObjectID(id.to_string()))
}

#[utoipa::path(
    summary = "Queue a notification for delivery",
    description = "Service-to-service ingress. The request is validated and queued; delivery happens asynchronously.",
    post,
    path = "/",
    request_body(content = NotificationRequest, content_type = "application/json"),
    tag = "Notification APIs",
    responses(
        (status = 202, description = "Notification queued", body = MessageResponseDto),
        (status = 400, description = "Bad Request"),
        (status = 429, description = "Ingress rate limit exceeded"),
        (status = 500, description = "Internal Server Error"),
        (status = 503, description = "Queue full or closed"),
    )
)]
pub async fn send_notification(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<NotificationRequest>, Error>,
) -> Result<(StatusCode, Json<MessageResponseDto>), Error> {
    if request.validate().is_err() {
        return Err(Error::bad_request(
            "User ID, type, title, and message are required",
        ));
    }

    let user_id = request.user_id.clone();
    state.queue.enqueue(request).await?;
    tracing::debug!(user_id = %user_id, "notification queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponseDto::new("Notification queued for delivery")),
    ))
}

#[utoipa::path(
    summary = "List the caller's notifications",
    get,
    path = "/",
    params(ListNotificationsQuery),
    tag = "Notification APIs",
    responses(
        (status = 200, description = "Newest first", body = NotificationListDto),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    auth: JwtAuth,
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListNotificationsQuery>, Error>,
) -> Result<Json<NotificationListDto>, Error> {
    let filter = NotificationFilter {
        unread_only: query.unread.unwrap_or(false),
        pagination: query.pagination(),
    };
    let page = state
        .notifications
        .find_by_user(auth.user_id(), &filter)
        .await?;

    Ok(Json(NotificationListDto {
        notifications: page.items.into_iter().map(NotificationDto::from).collect(),
        pagination: page.meta,
    }))
}

#[utoipa::path(
    summary = "Get one notification",
    get,
    path = "/{id}",
    params(("id" = String, Path, description = "Notification id")),
    tag = "Notification APIs",
    responses(
        (status = 200, body = NotificationDto),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Notification not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_notification(
    auth: JwtAuth,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, Error>,
) -> Result<Json<NotificationDto>, Error> {
    let id = parse_notification_id(&id)?;
    let notification = state
        .notifications
        .find_by_id(&id)
        .await?
        .filter(|n| n.user_id == auth.user_id())
        .ok_or_else(notification_not_found)?;

    Ok(Json(notification.into()))
}

#[utoipa::path(
    summary = "Mark a notification as read",
    patch,
    path = "/{id}/read",
    params(("id" = String, Path, description = "Notification id")),
    tag = "Notification APIs",
    responses(
        (status = 200, body = MessageResponseDto),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Notification not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    auth: JwtAuth,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, Error>,
) -> Result<Json<MessageResponseDto>, Error> {
    let id = parse_notification_id(&id)?;
    state.notifications.mark_read(&id, auth.user_id()).await?;
    Ok(Json(MessageResponseDto::new("Notification marked as read")))
}

#[utoipa::path(
    summary = "Mark every notification of the caller as read",
    patch,
    path = "/read-all",
    tag = "Notification APIs",
    responses((status = 200, body = MarkAllReadResponseDto)),
    security(("bearer_auth" = []))
)]
pub async fn mark_all_read(
    auth: JwtAuth,
    State(state): State<AppState>,
) -> Result<Json<MarkAllReadResponseDto>, Error> {
    let modified_count = state.notifications.mark_all_read(auth.user_id()).await?;
    Ok(Json(MarkAllReadResponseDto {
        message: "All notifications marked as read".to_string(),
        modified_count,
    }))
}

#[utoipa::path(
    summary = "Delete a notification",
    delete,
    path = "/{id}",
    params(("id" = String, Path, description = "Notification id")),
    tag = "Notification APIs",
    responses(
        (status = 200, body = MessageResponseDto),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Notification not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_notification(
    auth: JwtAuth,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, Error>,
) -> Result<Json<MessageResponseDto>, Error> {
    let id = parse_notification_id(&id)?;
    state.notifications.delete(&id, auth.user_id()).await?;
    Ok(Json(MessageResponseDto::new("Notification deleted")))
}

#[utoipa::path(
    summary = "Get the caller's notification preferences",
    get,
    path = "/preferences",
    tag = "Notification APIs",
    responses((status = 200, body = PreferencesDto)),
    security(("bearer_auth" = []))
)]
pub async fn get_preferences(
    auth: JwtAuth,
    State(state): State<AppState>,
) -> Result<Json<PreferencesDto>, Error> {
    let preferences = state.preferences.get_preferences(auth.user_id()).await?;
    Ok(Json(preferences.into()))
}

#[utoipa::path(
    summary = "Update notification preferences",
    description = "Partial update. Top-level fields replace the stored value, channel settings are merged field by field.",
    put,
    path = "/preferences",
    request_body(content = PreferencesUpdate, content_type = "application/json"),
    tag = "Notification APIs",
    responses(
        (status = 200, body = UpdatePreferencesResponseDto),
        (status = 400, description = "Empty, malformed or unknown fields"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_preferences(
    auth: JwtAuth,
    State(state): State<AppState>,
    WithRejection(Json(update), _): WithRejection<Json<PreferencesUpdate>, Error>,
) -> Result<Json<UpdatePreferencesResponseDto>, Error> {
    if update.is_empty() {
        return Err(Error::bad_request("Preferences are required"));
    }
    update.validate()?;

    let preferences = state
        .preferences
        .update_preferences(auth.user_id(), &update)
        .await?;

    Ok(Json(UpdatePreferencesResponseDto {
        message: "Notification preferences updated".to_string(),
        preferences: preferences.into(),
    }))
}

#[utoipa::path(
    summary = "Register a device push token",
    post,
    path = "/push-token",
    request_body(content = RegisterPushTokenRequestDto, content_type = "application/json"),
    tag = "Notification APIs",
    responses(
        (status = 200, body = MessageResponseDto),
        (status = 400, description = "Token and platform are required"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn register_push_token(
    auth: JwtAuth,
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<RegisterPushTokenRequestDto>, Error>,
) -> Result<Json<MessageResponseDto>, Error> {
    let platform = match (request.validate(), request.platform) {
        (Ok(()), Some(platform)) => platform,
        _ => return Err(Error::bad_request("Token and platform are required")),
    };

    state
        .preferences
        .add_push_token(auth.user_id(), &request.token, platform)
        .await?;

    Ok(Json(MessageResponseDto::new(
        "Push token registered successfully",
    )))
}

#[utoipa::path(
    summary = "Unregister a device push token",
    delete,
    path = "/push-token",
    request_body(content = RemovePushTokenRequestDto, content_type = "application/json"),
    tag = "Notification APIs",
    responses(
        (status = 200, body = RemovePushTokenResponseDto),
        (status = 400, description = "Token is required"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_push_token(
    auth: JwtAuth,
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<RemovePushTokenRequestDto>, Error>,
) -> Result<Json<RemovePushTokenResponseDto>, Error> {
    if request.validate().is_err() {
        return Err(Error::bad_request("Token is required"));
    }

    let removed = state
        .preferences
        .remove_push_token(auth.user_id(), &request.token)
        .await?;

    let message = if removed {
        "Push token removed"
    } else {
        "Push token was not registered"
    };
    Ok(Json(RemovePushTokenResponseDto {
        message: message.to_string(),
        removed,
    }))
}
