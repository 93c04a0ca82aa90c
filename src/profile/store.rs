//! Persisted profile store
//!
//! Key-value persistence of taste vectors keyed by user id, with upsert
//! and lookup semantics. The storage-backed implementation keeps one JSON
//! blob per user; the in-memory implementation backs tests and
//! single-process deployments without persistence.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::StorageBackend;
use crate::types::{UserProfile, Vector};
use crate::Result;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert or overwrite a user's profile (upsert)
    async fn save_or_update(&self, profile: &UserProfile) -> Result<()>;

    /// Look up a profile; absent is `Ok(None)`, not an error
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// All persisted profiles, for batch index rebuilds
    async fn all_profiles(&self) -> Result<Vec<UserProfile>>;
}

#[derive(Serialize, Deserialize)]
struct StoredProfile {
    user_id: String,
    taste_vector: Vector,
    updated_at: DateTime<Utc>,
}

/// Profile store on top of a [`StorageBackend`].
pub struct StorageProfileStore {
    storage: Arc<dyn StorageBackend>,
    prefix: String,
}

impl StorageProfileStore {
    pub fn new(storage: Arc<dyn StorageBackend>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    fn key_for(&self, user_id: &str) -> String {
        format!("{}/users/{}.json", self.prefix, user_id)
    }
}

#[async_trait]
impl ProfileStore for StorageProfileStore {
    async fn save_or_update(&self, profile: &UserProfile) -> Result<()> {
        let stored = StoredProfile {
            user_id: profile.user_id.clone(),
            taste_vector: profile.taste_vector.clone(),
            updated_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&stored)?;
        self.storage
            .put(&self.key_for(&profile.user_id), Bytes::from(bytes))
            .await?;

        tracing::debug!(user_id = %profile.user_id, "Profile saved");
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let key = self.key_for(user_id);
        if !self.storage.exists(&key).await? {
            return Ok(None);
        }

        let bytes = self.storage.get(&key).await?;
        let stored: StoredProfile = serde_json::from_slice(&bytes)?;
        Ok(Some(UserProfile {
            user_id: stored.user_id,
            taste_vector: stored.taste_vector,
        }))
    }

    async fn all_profiles(&self) -> Result<Vec<UserProfile>> {
        let keys = self.storage.list(&format!("{}/users", self.prefix)).await?;

        let mut profiles = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes = self.storage.get(&key).await?;
            match serde_json::from_slice::<StoredProfile>(&bytes) {
                Ok(stored) => profiles.push(UserProfile {
                    user_id: stored.user_id,
                    taste_vector: stored.taste_vector,
                }),
                Err(err) => {
                    tracing::warn!(%key, error = %err, "Skipping unreadable profile record");
                }
            }
        }

        Ok(profiles)
    }
}

/// In-memory profile store.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: DashMap<String, Vector>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn save_or_update(&self, profile: &UserProfile) -> Result<()> {
        self.profiles
            .insert(profile.user_id.clone(), profile.taste_vector.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).map(|entry| UserProfile {
            user_id: user_id.to_string(),
            taste_vector: entry.value().clone(),
        }))
    }

    async fn all_profiles(&self) -> Result<Vec<UserProfile>> {
        Ok(self
            .profiles
            .iter()
            .map(|entry| UserProfile {
                user_id: entry.key().clone(),
                taste_vector: entry.value().clone(),
            })
            .collect())
    }
}
