use async_trait::async_trait;
use wither::bson::oid::ObjectId;
use wither::bson::{self, DateTime, doc};
use wither::mongodb::Database;
use wither::mongodb::error::{ErrorKind, WriteFailure};
use wither::mongodb::options::{FindOptions, UpdateOptions};

use crate::enums::{NotificationStatus, PushPlatform};
use crate::errors::Error;
use crate::models::notification::{DeliveryReport, Notification};
use crate::models::user_preferences::{PreferencesUpdate, PushToken, UserPreferences};
use crate::store::{NotificationFilter, NotificationStore, PreferenceStore, notification_not_found};
use crate::utils::models::ModelExt;
use crate::utils::pagination::{Page, PaginationMeta};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoNotificationStore {
    db: Database,
}

impl MongoNotificationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    async fn create(&self, notification: Notification) -> Result<Notification, Error> {
        Notification::create(&self.db, notification).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Notification>, Error> {
        Notification::find_one(&self.db, doc! { "_id": id }, None).await
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Page<Notification>, Error> {
        let mut query = doc! { "userId": user_id };
        if filter.unread_only {
            query.insert("read", false);
        }

        let pagination = &filter.pagination;
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .skip(pagination.skip())
            .limit(i64::from(pagination.limit()))
            .build();

        let (items, total) = Notification::find_and_count(&self.db, query, options).await?;

        Ok(Page {
            items,
            meta: PaginationMeta::new(total, pagination),
        })
    }

    async fn mark_read(&self, id: &ObjectId, user_id: &str) -> Result<Notification, Error> {
        let now = DateTime::now();
        let updated = Notification::find_one_and_update(
            &self.db,
            doc! { "_id": id, "userId": user_id, "read": false },
            doc! { "$set": { "read": true, "readAt": now, "updatedAt": now } },
            false,
        )
        .await?;

        match updated {
            Some(notification) => Ok(notification),
            // Already read, or not this user's record.
            None => Notification::find_one(&self.db, doc! { "_id": id, "userId": user_id }, None)
                .await?
                .ok_or_else(notification_not_found),
        }
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, Error> {
        let now = DateTime::now();
        let result = Notification::update_many(
            &self.db,
            doc! { "userId": user_id, "read": false },
            doc! { "$set": { "read": true, "readAt": now, "updatedAt": now } },
        )
        .await?;

        Ok(result.modified_count)
    }

    async fn delete(&self, id: &ObjectId, user_id: &str) -> Result<(), Error> {
        let result =
            Notification::delete_one(&self.db, doc! { "_id": id, "userId": user_id }).await?;

        if result.deleted_count == 0 {
            return Err(notification_not_found());
        }
        Ok(())
    }

    async fn finalize(
        &self,
        id: &ObjectId,
        report: &DeliveryReport,
    ) -> Result<Notification, Error> {
        let now = DateTime::now();
        let mut set = doc! {
            "status": report.status.to_string(),
            "deliveredChannels": bson::to_bson(&report.delivered_channels)?,
            "deliveryResults": bson::to_bson(&report.results)?,
            "updatedAt": now,
        };
        if report.status.reached_recipient() {
            set.insert("deliveredAt", now);
        }

        let query = doc! {
            "_id": id,
            "status": NotificationStatus::Pending.to_string(),
        };

        Notification::find_one_and_update(&self.db, query, doc! { "$set": set }, false)
            .await?
            .ok_or_else(|| {
                Error::internal_err(&format!("Notification {id} is missing or no longer pending"))
            })
    }
}

#[derive(Clone)]
pub struct MongoPreferenceStore {
    db: Database,
}

impl MongoPreferenceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn refresh_push_token(
        &self,
        user_id: &str,
        token: &str,
        platform: PushPlatform,
        now: DateTime,
    ) -> Result<bool, Error> {
        let result = UserPreferences::update_one(
            &self.db,
            doc! { "userId": user_id, "pushTokens.token": token },
            doc! {
                "$set": {
                    "pushTokens.$.platform": platform.to_string(),
                    "pushTokens.$.lastUsed": now,
                    "updatedAt": now,
                }
            },
            None,
        )
        .await?;

        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl PreferenceStore for MongoPreferenceStore {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences, Error> {
        let preferences =
            UserPreferences::find_one(&self.db, doc! { "userId": user_id }, None).await?;

        Ok(preferences.unwrap_or_else(|| UserPreferences::default_for(user_id)))
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
        let mut set = update.set_document();
        set.insert("updatedAt", now);

        UserPreferences::find_one_and_update(
            &self.db,
            doc! { "userId": user_id },
            doc! { "$set": set, "$setOnInsert": { "createdAt": now } },
            true,
        )
        .await?
        .ok_or_else(|| {
            Error::internal_err(&format!(
                "Failed to upsert notification preferences for user_id={user_id}"
            ))
        })
    }

    async fn add_push_token(
        &self,
        user_id: &str,
        token: &str,
        platform: PushPlatform,
    ) -> Result<(), Error> {
        let now = DateTime::now();

        if self.refresh_push_token(user_id, token, platform, now).await? {
            return Ok(());
        }

        let entry = bson::to_bson(&PushToken {
            token: token.to_string(),
            platform,
            created_at: now,
            last_used: None,
        })?;

        let result = UserPreferences::update_one(
            &self.db,
            doc! { "userId": user_id, "pushTokens.token": { "$ne": token } },
            doc! {
                "$push": { "pushTokens": entry },
                "$set": { "updatedAt": now },
                "$setOnInsert": { "createdAt": now },
            },
            UpdateOptions::builder().upsert(true).build(),
        )
        .await;

        match result {
            Ok(_) => Ok(()),
            // Lost a race against a registration of the same token.
            Err(e) if is_duplicate_key(&e) => {
                self.refresh_push_token(user_id, token, platform, now).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn remove_push_token(&self, user_id: &str, token: &str) -> Result<bool, Error> {
        let result = UserPreferences::update_one(
            &self.db,
            doc! { "userId": user_id },
            doc! {
                "$pull": { "pushTokens": { "token": token } },
                "$set": { "updatedAt": DateTime::now() },
            },
            None,
        )
        .await?;

        Ok(result.modified_count > 0)
    }
}

fn is_duplicate_key(error: &Error) -> bool {
    let Error::Mongo(error) = error else {
        return false;
    };
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
