//! Background profile updates
//!
//! All mutations of the user-profile index (add + save) are serialized
//! through one worker task draining a channel. The read path only ever
//! takes the index read lock, so a rating write never blocks on index
//! maintenance and readers never observe a half-applied mutation.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::history::InteractionProvider;
use crate::profile::{ProfileStore, TasteVectorCalculator, UserProfileIndex};
use crate::storage::StorageBackend;
use crate::types::UserProfile;
use crate::Result;

/// A mutation request for the profile index.
#[derive(Debug)]
pub enum ProfileUpdate {
    /// Recompute one user's taste vector from their current history,
    /// upsert it to the store and refresh the live index.
    Refresh { user_id: String },
}

pub struct ProfileUpdater {
    interactions: Arc<dyn InteractionProvider>,
    taste: TasteVectorCalculator,
    profiles: Arc<dyn ProfileStore>,
    profile_index: Arc<RwLock<UserProfileIndex>>,
    storage: Arc<dyn StorageBackend>,
}

impl ProfileUpdater {
    pub fn new(
        interactions: Arc<dyn InteractionProvider>,
        taste: TasteVectorCalculator,
        profiles: Arc<dyn ProfileStore>,
        profile_index: Arc<RwLock<UserProfileIndex>>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            interactions,
            taste,
            profiles,
            profile_index,
            storage,
        }
    }

    /// Start the single-writer worker task and return its input channel.
    /// The task exits when every sender is dropped.
    pub fn spawn(self) -> mpsc::UnboundedSender<ProfileUpdate> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            tracing::info!("Profile update worker started");
            while let Some(update) = rx.recv().await {
                if let Err(err) = self.handle(update).await {
                    tracing::warn!(error = %err, "Profile update failed");
                }
            }
            tracing::info!("Profile update worker stopped");
        });

        tx
    }

    async fn handle(&self, update: ProfileUpdate) -> Result<()> {
        match update {
            ProfileUpdate::Refresh { user_id } => self.refresh(&user_id).await,
        }
    }

    async fn refresh(&self, user_id: &str) -> Result<()> {
        let history = self.interactions.history(user_id).await;
        if history.is_empty() {
            tracing::warn!(%user_id, "No history for profile refresh, skipping");
            return Ok(());
        }

        let Some(taste_vector) = self.taste.calculate(&history) else {
            tracing::warn!(%user_id, "Could not compute taste vector, skipping refresh");
            return Ok(());
        };

        self.profiles
            .save_or_update(&UserProfile {
                user_id: user_id.to_string(),
                taste_vector: taste_vector.clone(),
            })
            .await?;

        let mut index = self.profile_index.write().await;
        index.add(user_id, &taste_vector)?;
        index.save(self.storage.as_ref()).await?;

        tracing::info!(%user_id, "Profile refreshed and index persisted");
        Ok(())
    }
}
