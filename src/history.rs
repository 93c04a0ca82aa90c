//! Interaction history access
//!
//! The engine treats interaction history as an external, synchronous read.
//! Provider failures degrade to an empty history: recommendation is a
//! best-effort feature and must never fail a request because the history
//! backend hiccuped.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::storage::StorageBackend;
use crate::types::Interaction;

#[async_trait]
pub trait InteractionProvider: Send + Sync {
    /// A user's full interaction history, most recent ordering preserved
    /// as stored. Unknown users and backend failures yield an empty list.
    async fn history(&self, user_id: &str) -> Vec<Interaction>;
}

/// History provider reading one JSON snapshot per user from storage.
pub struct StorageInteractionProvider {
    storage: Arc<dyn StorageBackend>,
    prefix: String,
}

impl StorageInteractionProvider {
    pub fn new(storage: Arc<dyn StorageBackend>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    fn key_for(&self, user_id: &str) -> String {
        format!("{}/{}.json", self.prefix, user_id)
    }
}

#[async_trait]
impl InteractionProvider for StorageInteractionProvider {
    async fn history(&self, user_id: &str) -> Vec<Interaction> {
        let key = self.key_for(user_id);

        match self.storage.exists(&key).await {
            Ok(true) => {}
            Ok(false) => return Vec::new(),
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "History lookup failed");
                return Vec::new();
            }
        }

        let bytes = match self.storage.get(&key).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "History read failed");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<Interaction>>(&bytes) {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "History snapshot unreadable");
                Vec::new()
            }
        }
    }
}

/// In-memory history provider.
#[derive(Default)]
pub struct MemoryInteractionProvider {
    histories: DashMap<String, Vec<Interaction>>,
}

impl MemoryInteractionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_history(&self, user_id: impl Into<String>, history: Vec<Interaction>) {
        self.histories.insert(user_id.into(), history);
    }
}

#[async_trait]
impl InteractionProvider for MemoryInteractionProvider {
    async fn history(&self, user_id: &str) -> Vec<Interaction> {
        self.histories
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::LocalStorage;
    use bytes::Bytes;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unknown_user_yields_empty_history() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(temp_dir.path()).unwrap());
        let provider = StorageInteractionProvider::new(storage, "interactions");

        assert!(provider.history("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_yields_empty_history() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(temp_dir.path()).unwrap());
        storage
            .put("interactions/u1.json", Bytes::from("not json"))
            .await
            .unwrap();

        let provider = StorageInteractionProvider::new(storage, "interactions");
        assert!(provider.history("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(temp_dir.path()).unwrap());

        let history = vec![Interaction {
            user_id: "u1".to_string(),
            title: "Alpha".to_string(),
            rating: 5.0,
        }];
        storage
            .put(
                "interactions/u1.json",
                Bytes::from(serde_json::to_vec(&history).unwrap()),
            )
            .await
            .unwrap();

        let provider = StorageInteractionProvider::new(storage, "interactions");
        let loaded = provider.history("u1").await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "Alpha");
    }
}
