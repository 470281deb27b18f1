//! Persistence seams of the fan-out pipeline.
//!
//! The engine, the queue worker and the HTTP handlers only see these traits;
//! `mongo` holds the production implementations, `memory` in-process ones and
//! `cached_preferences` the Redis read-through layer for preferences.

use async_trait::async_trait;
use wither::bson::oid::ObjectId;

use crate::enums::PushPlatform;
use crate::errors::Error;
use crate::models::notification::{DeliveryReport, Notification};
use crate::models::user_preferences::{PreferencesUpdate, UserPreferences};
use crate::utils::pagination::{Page, PaginationQuery};

pub mod cached_preferences;
pub mod memory;
pub mod mongo;

#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub unread_only: bool,
    pub pagination: PaginationQuery,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persists a new record and returns it with its id assigned.
    async fn create(&self, notification: Notification) -> Result<Notification, Error>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Notification>, Error>;

    /// Newest first, offset paginated.
    async fn find_by_user(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Page<Notification>, Error>;

    /// Owner-only; `NotFound` for records of other users. Idempotent.
    async fn mark_read(&self, id: &ObjectId, user_id: &str) -> Result<Notification, Error>;

    /// Returns how many records changed.
    async fn mark_all_read(&self, user_id: &str) -> Result<u64, Error>;

    /// Owner-only; `NotFound` for records of other users.
    async fn delete(&self, id: &ObjectId, user_id: &str) -> Result<(), Error>;

    /// Moves a `pending` record to its terminal status. Fails if the record
    /// is missing or already terminal.
    async fn finalize(&self, id: &ObjectId, report: &DeliveryReport)
    -> Result<Notification, Error>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Never fails with not-found: unknown users get the default preferences.
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences, Error>;

    /// Merges `update` into the stored preferences, creating them if needed.
    async fn update_preferences(
        &self,
        user_id: &str,
        update: &PreferencesUpdate,
    ) -> Result<UserPreferences, Error>;

    /// Upsert keyed by `(user_id, token)`.
    async fn add_push_token(
        &self,
        user_id: &str,
        token: &str,
        platform: PushPlatform,
    ) -> Result<(), Error>;

    /// Returns whether the token was registered.
    async fn remove_push_token(&self, user_id: &str, token: &str) -> Result<bool, Error>;
}

pub(crate) fn notification_not_found() -> Error {
    Error::not_found("Notification not found")
}
