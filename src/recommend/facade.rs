//! Recommendation facade
//!
//! Single entry point for callers: orchestrates history retrieval, taste
//! vector construction, lazy profile creation and the two recommendation
//! strategies. All dependencies are injected; the facade holds no global
//! state.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::catalog::VectorCatalog;
use crate::history::InteractionProvider;
use crate::profile::{ProfileStore, TasteVectorCalculator, UserProfileIndex};
use crate::recommend::updater::ProfileUpdate;
use crate::recommend::{CollaborativeFilteringRecommender, ContentBasedRecommender};
use crate::storage::StorageBackend;
use crate::types::{Interaction, RerankContext, UserProfile};
use crate::Result;

pub struct RecommenderFacade {
    catalog: Arc<VectorCatalog>,
    content: ContentBasedRecommender,
    collaborative: CollaborativeFilteringRecommender,
    taste: TasteVectorCalculator,
    interactions: Arc<dyn InteractionProvider>,
    profiles: Arc<dyn ProfileStore>,
    profile_index: Arc<RwLock<UserProfileIndex>>,
    storage: Arc<dyn StorageBackend>,
    num_neighbors: usize,
    updates: mpsc::UnboundedSender<ProfileUpdate>,
}

impl RecommenderFacade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<VectorCatalog>,
        content: ContentBasedRecommender,
        collaborative: CollaborativeFilteringRecommender,
        taste: TasteVectorCalculator,
        interactions: Arc<dyn InteractionProvider>,
        profiles: Arc<dyn ProfileStore>,
        profile_index: Arc<RwLock<UserProfileIndex>>,
        storage: Arc<dyn StorageBackend>,
        num_neighbors: usize,
        updates: mpsc::UnboundedSender<ProfileUpdate>,
    ) -> Self {
        Self {
            catalog,
            content,
            collaborative,
            taste,
            interactions,
            profiles,
            profile_index,
            storage,
            num_neighbors,
            updates,
        }
    }

    pub fn catalog_size(&self) -> usize {
        self.catalog.len()
    }

    pub async fn indexed_profiles(&self) -> usize {
        self.profile_index.read().await.len()
    }

    /// Content-based recommendations from the user's own history.
    ///
    /// A user with no history, or whose history resolves to nothing, gets
    /// an empty list.
    pub async fn recommend_with_content_based(
        &self,
        user_id: &str,
        top_n: usize,
    ) -> Result<Vec<String>> {
        let history = self.interactions.history(user_id).await;
        if history.is_empty() {
            tracing::info!(%user_id, "No interaction history, returning empty list");
            return Ok(Vec::new());
        }

        let Some(profile) = self.taste.calculate(&history) else {
            return Ok(Vec::new());
        };

        let ctx = self.prepare_rerank_context(&history);
        self.content.recommend_by_profile(&profile, top_n, &ctx)
    }

    /// Collaborative-filtering recommendations.
    ///
    /// The user's stored profile is resolved lazily: when absent it is
    /// computed from history, persisted and inserted into the live index
    /// before the neighbor search runs.
    pub async fn recommend_with_collaborative_filtering(
        &self,
        user_id: &str,
        top_n: usize,
    ) -> Result<Vec<String>> {
        let history = self.interactions.history(user_id).await;

        let Some(profile) = self.resolve_or_create_profile(user_id, &history).await? else {
            tracing::info!(%user_id, "No profile available, returning empty list");
            return Ok(Vec::new());
        };

        let ctx = self.prepare_rerank_context(&history);
        self.collaborative
            .recommend(&profile, top_n, self.num_neighbors, Some(user_id), &ctx)
            .await
    }

    /// Content-based recommendations from explicit seed titles.
    pub fn recommend_by_titles(&self, titles: &[String], top_n: usize) -> Result<Vec<String>> {
        self.content.recommend_by_titles(titles, top_n)
    }

    /// Queue an asynchronous profile refresh for a user. Fire-and-forget:
    /// the caller is never blocked on index mutation.
    pub fn schedule_profile_refresh(&self, user_id: &str) {
        let update = ProfileUpdate::Refresh {
            user_id: user_id.to_string(),
        };
        if self.updates.send(update).is_err() {
            tracing::warn!(%user_id, "Profile update worker is not running, refresh dropped");
        }
    }

    /// Batch-build the profile index for a set of users: compute every
    /// taste vector, upsert each to the store, build the index in one
    /// pass and persist its artifacts. Returns how many profiles made it
    /// into the index.
    pub async fn rebuild_profile_index(&self, user_ids: &[String]) -> Result<usize> {
        let mut profiles = Vec::with_capacity(user_ids.len());

        for user_id in user_ids {
            let history = self.interactions.history(user_id).await;
            if history.is_empty() {
                tracing::debug!(%user_id, "Skipping user with no history");
                continue;
            }
            let Some(taste_vector) = self.taste.calculate(&history) else {
                continue;
            };

            let profile = UserProfile {
                user_id: user_id.clone(),
                taste_vector,
            };
            self.profiles.save_or_update(&profile).await?;
            profiles.push(profile);
        }

        if profiles.is_empty() {
            tracing::warn!("No profile could be computed, index left unchanged");
            return Ok(0);
        }

        let mut index = self.profile_index.write().await;
        index.build(&profiles)?;
        index.save(self.storage.as_ref()).await?;

        Ok(profiles.len())
    }

    async fn resolve_or_create_profile(
        &self,
        user_id: &str,
        history: &[Interaction],
    ) -> Result<Option<Vec<f32>>> {
        if let Some(stored) = self.profiles.find_by_id(user_id).await? {
            return Ok(Some(stored.taste_vector));
        }

        let Some(taste_vector) = self.taste.calculate(history) else {
            return Ok(None);
        };

        let profile = UserProfile {
            user_id: user_id.to_string(),
            taste_vector: taste_vector.clone(),
        };
        self.profiles.save_or_update(&profile).await?;

        {
            let mut index = self.profile_index.write().await;
            index.add(user_id, &taste_vector)?;
        }

        tracing::info!(%user_id, "Profile created lazily and added to live index");
        Ok(Some(taste_vector))
    }

    /// Derive the re-ranking context from a user's history.
    ///
    /// Average page length comes from liked items only; preferred genres
    /// from liked items; disliked genres from disliked items minus any
    /// genre already preferred. Every resolved history item lands in the
    /// exclusion set.
    pub fn prepare_rerank_context(&self, history: &[Interaction]) -> RerankContext {
        let mut exclude = HashSet::new();
        let mut preferred_genres = HashSet::new();
        let mut page_lengths: Vec<f64> = Vec::new();

        for interaction in history {
            let Some(index) = self.catalog.index_of(&interaction.title) else {
                continue;
            };
            exclude.insert(index);

            let Some(item) = self.catalog.item(index) else {
                continue;
            };

            if interaction.is_liked() {
                if let Some(length) = item.page_length {
                    if length > 0.0 {
                        page_lengths.push(length);
                    }
                }
                preferred_genres.extend(item.genres.iter().cloned());
            }
        }

        // A genre cannot be simultaneously preferred and disliked
        let mut disliked_genres = HashSet::new();
        for interaction in history {
            if !interaction.is_disliked() {
                continue;
            }
            let Some(item) = self
                .catalog
                .index_of(&interaction.title)
                .and_then(|index| self.catalog.item(index))
            else {
                continue;
            };
            for genre in &item.genres {
                if !preferred_genres.contains(genre) {
                    disliked_genres.insert(genre.clone());
                }
            }
        }

        let avg_page_length = if page_lengths.is_empty() {
            0.0
        } else {
            page_lengths.iter().sum::<f64>() / page_lengths.len() as f64
        };

        RerankContext {
            exclude,
            avg_page_length,
            preferred_genres,
            disliked_genres,
        }
    }
}
