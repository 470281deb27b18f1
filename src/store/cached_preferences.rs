use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::cache::redis_service::RedisService;
use crate::enums::PushPlatform;
use crate::errors::Error;
use crate::models::user_preferences::{PreferencesUpdate, UserPreferences};
use crate::store::PreferenceStore;

const PREFERENCES_TTL_SECS: u64 = 60 * 60;

/// Where [`CachedPreferenceStore`] keeps its copies.
#[async_trait]
pub trait PreferenceCache: Send + Sync {
    async fn get(&self, user_id: &str) -> eyre::Result<Option<UserPreferences>>;

    /// Caches a document read after a miss. Never replaces an existing entry.
    async fn fill(&self, preferences: &UserPreferences) -> eyre::Result<()>;

    /// Caches a document just written to the store, unless the cached entry
    /// is newer.
    async fn store(&self, preferences: &UserPreferences) -> eyre::Result<()>;
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    version: i64,
    preferences: UserPreferences,
}

impl CacheEntry {
    fn new(preferences: &UserPreferences) -> Self {
        CacheEntry {
            version: cache_version(preferences),
            preferences: preferences.clone(),
        }
    }
}

/// `updatedAt` in millis; stored defaults are version 0.
pub fn cache_version(preferences: &UserPreferences) -> i64 {
    preferences
        .updated_at
        .map(|updated_at| updated_at.timestamp_millis())
        .unwrap_or(0)
}

fn cache_key(user_id: &str) -> String {
    format!("notification:preferences:{user_id}")
}

#[async_trait]
impl PreferenceCache for RedisService {
    async fn get(&self, user_id: &str) -> eyre::Result<Option<UserPreferences>> {
        let entry = self.get_cache_opt::<CacheEntry>(&cache_key(user_id)).await?;
        Ok(entry.map(|entry| entry.preferences))
    }

    async fn fill(&self, preferences: &UserPreferences) -> eyre::Result<()> {
        self.set_nx_ex_cache(
            &cache_key(&preferences.user_id),
            &CacheEntry::new(preferences),
            PREFERENCES_TTL_SECS,
        )
        .await?;
        Ok(())
    }

    async fn store(&self, preferences: &UserPreferences) -> eyre::Result<()> {
        let entry = CacheEntry::new(preferences);
        self.set_ex_if_newer(
            &cache_key(&preferences.user_id),
            &entry,
            entry.version,
            PREFERENCES_TTL_SECS,
        )
        .await?;
        Ok(())
    }
}

/// Read-through cache in front of another [`PreferenceStore`].
///
/// Misses are filled with set-if-absent, writes replace the entry with the
/// document read back from the store unless a newer one is cached. A read
/// that started before a write can therefore never leave its older copy
/// behind. Cache failures are logged and the call falls through to the inner
/// store.
pub struct CachedPreferenceStore {
    inner: Arc<dyn PreferenceStore>,
    cache: Arc<dyn PreferenceCache>,
}

impl CachedPreferenceStore {
    pub fn new(inner: Arc<dyn PreferenceStore>, cache: Arc<dyn PreferenceCache>) -> Self {
        Self { inner, cache }
    }

    async fn store_written(&self, preferences: &UserPreferences) {
        if let Err(e) = self.cache.store(preferences).await {
            tracing::warn!(user_id = %preferences.user_id, "failed to cache preferences: {e:?}");
        }
    }

    async fn refresh(&self, user_id: &str) -> Result<(), Error> {
        let preferences = self.inner.get_preferences(user_id).await?;
        self.store_written(&preferences).await;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for CachedPreferenceStore {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences, Error> {
        match self.cache.get(user_id).await {
            Ok(Some(preferences)) => return Ok(preferences),
            Ok(None) => {}
            Err(e) => tracing::warn!(user_id = %user_id, "preferences cache read failed: {e:?}"),
        }

        let preferences = self.inner.get_preferences(user_id).await?;
        if let Err(e) = self.cache.fill(&preferences).await {
            tracing::warn!(user_id = %user_id, "failed to cache preferences: {e:?}");
        }
        Ok(preferences)
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        update: &PreferencesUpdate,
    ) -> Result<UserPreferences, Error> {
        let preferences = self.inner.update_preferences(user_id, update).await?;
        self.store_written(&preferences).await;
        Ok(preferences)
    }

    async fn add_push_token(
        &self,
        user_id: &str,
        token: &str,
        platform: PushPlatform,
    ) -> Result<(), Error> {
        self.inner.add_push_token(user_id, token, platform).await?;
        self.refresh(user_id).await
    }

    async fn remove_push_token(&self, user_id: &str, token: &str) -> Result<bool, Error> {
        let removed = self.inner.remove_push_token(user_id, token).await?;
        if removed {
            self.refresh(user_id).await?;
        }
        Ok(removed)
    }
}
