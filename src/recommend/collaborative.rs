//! Collaborative filtering
//!
//! Finds users with similar taste vectors and aggregates the items those
//! neighbors liked. Items co-liked by several neighbors compound: each
//! neighbor contributes `similarity * rating / 5` to the item's score.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::catalog::VectorCatalog;
use crate::history::InteractionProvider;
use crate::profile::UserProfileIndex;
use crate::rerank::{self, ReRanker};
use crate::types::{ItemId, RerankContext, Vector};
use crate::Result;

pub struct CollaborativeFilteringRecommender {
    catalog: Arc<VectorCatalog>,
    profile_index: Arc<RwLock<UserProfileIndex>>,
    interactions: Arc<dyn InteractionProvider>,
    rerankers: Vec<Box<dyn ReRanker>>,
}

impl CollaborativeFilteringRecommender {
    pub fn new(
        catalog: Arc<VectorCatalog>,
        profile_index: Arc<RwLock<UserProfileIndex>>,
        interactions: Arc<dyn InteractionProvider>,
        rerankers: Vec<Box<dyn ReRanker>>,
    ) -> Self {
        Self {
            catalog,
            profile_index,
            interactions,
            rerankers,
        }
    }

    /// Recommend `top_n` titles liked by the `num_neighbors` users closest
    /// to the target taste vector.
    ///
    /// The target user is excluded from the neighbor search when
    /// `user_id` is given; the target does not need a stored profile to
    /// query the index. No neighbors or no qualifying liked items is an
    /// empty result, not an error.
    pub async fn recommend(
        &self,
        target: &Vector,
        top_n: usize,
        num_neighbors: usize,
        user_id: Option<&str>,
        ctx: &RerankContext,
    ) -> Result<Vec<String>> {
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let neighbors = {
            let index = self.profile_index.read().await;
            index.search(target, num_neighbors, user_id)?
        };

        if neighbors.is_empty() {
            tracing::debug!("No neighbors found, returning empty recommendation list");
            return Ok(Vec::new());
        }

        let mut scores: HashMap<ItemId, f32> = HashMap::new();
        for (neighbor_id, similarity) in &neighbors {
            let history = self.interactions.history(neighbor_id).await;
            for interaction in history {
                if !interaction.is_liked() {
                    continue;
                }
                let Some(index) = self.catalog.index_of(&interaction.title) else {
                    tracing::warn!(
                        title = %interaction.title,
                        "Neighbor-liked item not found in catalog, skipping"
                    );
                    continue;
                };
                if ctx.exclude.contains(&index) {
                    continue;
                }
                *scores.entry(index).or_default() += similarity * (interaction.rating / 5.0);
            }
        }

        if scores.is_empty() {
            tracing::debug!("Neighbors had no qualifying liked items");
            return Ok(Vec::new());
        }

        // Deterministic pre-rerank ordering: by score, then by item index
        let mut candidates: Vec<(ItemId, f32)> = scores.into_iter().collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let reranked = rerank::apply_pipeline(&self.rerankers, candidates, &self.catalog, ctx);

        Ok(reranked
            .into_iter()
            .take(top_n)
            .filter_map(|(index, _)| self.catalog.title_of(index).map(str::to_string))
            .collect())
    }
}
