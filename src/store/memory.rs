//! In-process stores used by tests. Expiry is enforced by
//! [`InMemoryNotificationStore::purge_expired`], the counterpart of the Mongo
//! TTL index.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use wither::bson::DateTime;
use wither::bson::oid::ObjectId;

use crate::enums::PushPlatform;
use crate::errors::Error;
use crate::models::notification::{DeliveryReport, Notification};
use crate::models::user_preferences::{PreferencesUpdate, UserPreferences};
use crate::store::{NotificationFilter, NotificationStore, PreferenceStore, notification_not_found};
use crate::utils::pagination::{Page, PaginationMeta};

#[derive(Clone, Default)]
pub struct InMemoryNotificationStore {
    records: Arc<RwLock<HashMap<ObjectId, Notification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every record whose `expiresAt` has passed. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let now = DateTime::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, notification| !notification.is_expired(now));
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, mut notification: Notification) -> Result<Notification, Error> {
        let id = ObjectId::new();
        notification.id = Some(id);
        self.records.write().await.insert(id, notification.clone());
        Ok(notification)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Notification>, Error> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Page<Notification>, Error> {
        let records = self.records.read().await;
        let mut matching: Vec<&Notification> = records
            .values()
            .filter(|n| n.user_id == user_id && (!filter.unread_only || !n.read))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let pagination = &filter.pagination;
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.skip() as usize)
            .take(pagination.limit() as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            meta: PaginationMeta::new(total, pagination),
        })
    }

    async fn mark_read(&self, id: &ObjectId, user_id: &str) -> Result<Notification, Error> {
        let mut records = self.records.write().await;
        let notification = records
            .get_mut(id)
            .filter(|n| n.user_id == user_id)
            .ok_or_else(notification_not_found)?;
        notification.mark_read(DateTime::now());
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, Error> {
        let now = DateTime::now();
        let mut records = self.records.write().await;
        let mut modified = 0;
        for notification in records
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            notification.mark_read(now);
            modified += 1;
        }
        Ok(modified)
    }

    async fn delete(&self, id: &ObjectId, user_id: &str) -> Result<(), Error> {
        let mut records = self.records.write().await;
        match records.get(id) {
            Some(notification) if notification.user_id == user_id => {
                records.remove(id);
                Ok(())
            }
            _ => Err(notification_not_found()),
        }
    }

    async fn finalize(
        &self,
        id: &ObjectId,
        report: &DeliveryReport,
    ) -> Result<Notification, Error> {
        let mut records = self.records.write().await;
        let notification = records.get_mut(id).ok_or_else(|| {
            Error::internal_err(&format!("Notification {id} is missing or no longer pending"))
        })?;
        if !notification.finalize(report, DateTime::now()) {
            return Err(Error::internal_err(&format!(
                "Notification {id} is missing or no longer pending"
            )));
        }
        Ok(notification.clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPreferenceStore {
    preferences: Arc<RwLock<HashMap<String, UserPreferences>>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences, Error> {
        Ok(self
            .preferences
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserPreferences::default_for(user_id)))
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        update: &PreferencesUpdate,
    ) -> Result<UserPreferences, Error> {
        if update.is_empty() {
            return self.get_preferences(user_id).await;
        }

        let now = DateTime::now();
        let mut preferences = self.preferences.write().await;
        let entry = preferences
            .entry(user_id.to_string())
            .or_insert_with(|| new_document(user_id, now));
        entry.apply(update);
        entry.updated_at = Some(now);
        Ok(entry.clone())
    }

    async fn add_push_token(
        &self,
        user_id: &str,
        token: &str,
        platform: PushPlatform,
    ) -> Result<(), Error> {
        let now = DateTime::now();
        let mut preferences = self.preferences.write().await;
        let entry = preferences
            .entry(user_id.to_string())
            .or_insert_with(|| new_document(user_id, now));
        entry.upsert_push_token(token, platform, now);
        entry.updated_at = Some(now);
        Ok(())
    }

    async fn remove_push_token(&self, user_id: &str, token: &str) -> Result<bool, Error> {
        let mut preferences = self.preferences.write().await;
        let Some(entry) = preferences.get_mut(user_id) else {
            return Ok(false);
        };
        let removed = entry.remove_push_token(token);
        if removed {
            entry.updated_at = Some(DateTime::now());
        }
        Ok(removed)
    }
}

fn new_document(user_id: &str, now: DateTime) -> UserPreferences {
    let mut preferences = UserPreferences::default_for(user_id);
    preferences.id = Some(ObjectId::new());
    preferences.created_at = Some(now);
    preferences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Channel, NotificationStatus};
    use crate::models::notification::ChannelDeliveryResult;
    use crate::models::notification_request::NotificationRequest;
    use crate::utils::pagination::PaginationQuery;
    use assert_matches::assert_matches;

    fn pending(user_id: &str, created_at_millis: i64) -> Notification {
        let mut notification =
            Notification::pending(&NotificationRequest::new(user_id, "track_like", "t", "m"));
        notification.created_at = DateTime::from_millis(created_at_millis);
        notification
    }

    fn filter(page: u32, limit: u32, unread_only: bool) -> NotificationFilter {
        NotificationFilter {
            unread_only,
            pagination: PaginationQuery::new(page, limit),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_with_pagination() {
        let store = InMemoryNotificationStore::new();
        for i in 0..5 {
            store.create(pending("u1", 1_000 + i)).await.unwrap();
        }
        store.create(pending("u2", 9_000)).await.unwrap();

        let page = store.find_by_user("u1", &filter(1, 2, false)).await.unwrap();
        assert_eq!(page.meta.total, 5);
        assert_eq!(page.meta.pages, 3);
        let times: Vec<i64> = page
            .items
            .iter()
            .map(|n| n.created_at.timestamp_millis())
            .collect();
        assert_eq!(times, vec![1_004, 1_003]);

        let last = store.find_by_user("u1", &filter(3, 2, false)).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].created_at.timestamp_millis(), 1_000);
    }

    #[tokio::test]
    async fn unread_filter_and_mark_all_read() {
        let store = InMemoryNotificationStore::new();
        let first = store.create(pending("u1", 1)).await.unwrap();
        store.create(pending("u1", 2)).await.unwrap();
        store.create(pending("u2", 3)).await.unwrap();

        store.mark_read(&first.id.unwrap(), "u1").await.unwrap();
        let unread = store.find_by_user("u1", &filter(1, 20, true)).await.unwrap();
        assert_eq!(unread.meta.total, 1);

        assert_eq!(store.mark_all_read("u1").await.unwrap(), 1);
        assert_eq!(store.mark_all_read("u1").await.unwrap(), 0);
        let other = store.find_by_user("u2", &filter(1, 20, true)).await.unwrap();
        assert_eq!(other.meta.total, 1);
    }

    #[tokio::test]
    async fn ownership_is_enforced() {
        let store = InMemoryNotificationStore::new();
        let created = store.create(pending("u1", 1)).await.unwrap();
        let id = created.id.unwrap();

        assert_matches!(store.mark_read(&id, "u2").await, Err(Error::NotFound(_)));
        assert_matches!(store.delete(&id, "u2").await, Err(Error::NotFound(_)));
        assert!(store.find_by_id(&id).await.unwrap().is_some());

        store.delete(&id, "u1").await.unwrap();
        assert!(store.find_by_id(&id).await.unwrap().is_none());
        assert_matches!(store.delete(&id, "u1").await, Err(Error::NotFound(_)));
    }

    #[tokio::test]
    async fn mark_read_keeps_first_timestamp() {
        let store = InMemoryNotificationStore::new();
        let id = store.create(pending("u1", 1)).await.unwrap().id.unwrap();
        let first = store.mark_read(&id, "u1").await.unwrap();
        let second = store.mark_read(&id, "u1").await.unwrap();
        assert!(second.read);
        assert_eq!(first.read_at, second.read_at);
    }

    #[tokio::test]
    async fn finalize_only_from_pending() {
        let store = InMemoryNotificationStore::new();
        let id = store.create(pending("u1", 1)).await.unwrap().id.unwrap();
        let report =
            DeliveryReport::from_results(vec![ChannelDeliveryResult::delivered(Channel::App)]);

        let finalized = store.finalize(&id, &report).await.unwrap();
        assert_eq!(finalized.status, NotificationStatus::Delivered);
        assert!(finalized.delivered_at.is_some());

        assert_matches!(
            store.finalize(&id, &DeliveryReport::aborted(vec![])).await,
            Err(Error::Internal(_))
        );
        let stored = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Delivered);
    }

    #[tokio::test]
    async fn expired_records_are_purged() {
        let store = InMemoryNotificationStore::new();
        let mut expired = pending("u1", 1);
        expired.expires_at = Some(DateTime::from_millis(10));
        store.create(expired).await.unwrap();
        store.create(pending("u1", 2)).await.unwrap();

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn preferences_default_then_merge() {
        let store = InMemoryPreferenceStore::new();
        let defaults = store.get_preferences("u1").await.unwrap();
        assert!(defaults.id.is_none());

        let update: PreferencesUpdate =
            serde_json::from_str(r#"{"channelPreferences":{"push":{"enabled":false}}}"#).unwrap();
        let saved = store.update_preferences("u1", &update).await.unwrap();
        assert!(saved.id.is_some());
        assert!(!saved.channel_preferences.push.enabled);
        assert!(saved.channel_preferences.email.enabled);
    }

    #[tokio::test]
    async fn push_tokens_are_upserted_and_removed() {
        let store = InMemoryPreferenceStore::new();
        store
            .add_push_token("u1", "tok", PushPlatform::Ios)
            .await
            .unwrap();
        store
            .add_push_token("u1", "tok", PushPlatform::Ios)
            .await
            .unwrap();
        assert_eq!(
            store.get_preferences("u1").await.unwrap().push_token_values(),
            vec!["tok"]
        );

        assert!(store.remove_push_token("u1", "tok").await.unwrap());
        assert!(!store.remove_push_token("u1", "tok").await.unwrap());
        assert!(!store.remove_push_token("nobody", "tok").await.unwrap());
    }
}
