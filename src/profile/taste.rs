//! Taste vector construction
//!
//! Turns a user's rated-item history into a single profile vector directly
//! comparable to catalog item vectors.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::VectorCatalog;
use crate::types::{Interaction, ItemId, Vector, NEUTRAL_RATING};

/// Computes a weighted average of the vectors of rated items.
///
/// Ratings above neutral contribute positively, below neutral negatively,
/// exactly neutral not at all. A history where every rating is neutral
/// falls back to the unweighted mean of the resolved item vectors.
#[derive(Clone)]
pub struct TasteVectorCalculator {
    catalog: Arc<VectorCatalog>,
}

impl TasteVectorCalculator {
    pub fn new(catalog: Arc<VectorCatalog>) -> Self {
        Self { catalog }
    }

    /// Calculate the taste vector for a history.
    ///
    /// Returns `None` when no interaction resolves to a catalog item; the
    /// caller must treat that as "no recommendation possible", not as an
    /// error. Unresolvable titles are logged and skipped, never fatal.
    pub fn calculate(&self, history: &[Interaction]) -> Option<Vector> {
        if history.is_empty() {
            tracing::warn!("Cannot calculate taste vector from empty history");
            return None;
        }

        let dimension = self.catalog.dimension();
        let mut accumulator = vec![0.0f32; dimension];
        let mut total_weight = 0.0f32;
        let mut resolved: HashSet<ItemId> = HashSet::new();

        for interaction in history {
            let Some(index) = self.catalog.index_of(&interaction.title) else {
                tracing::warn!(
                    title = %interaction.title,
                    "Rated item not found in catalog, skipping"
                );
                continue;
            };

            let Some(vector) = self.catalog.vector(index) else {
                continue;
            };

            resolved.insert(index);

            // Weight in [-1, 1], zero at the neutral rating
            let weight = (interaction.rating - NEUTRAL_RATING) / 2.0;
            for (acc, value) in accumulator.iter_mut().zip(vector.iter()) {
                *acc += value * weight;
            }
            total_weight += weight.abs();
        }

        if resolved.is_empty() {
            tracing::warn!("No rated item resolved to a catalog entry");
            return None;
        }

        let profile = if total_weight == 0.0 {
            tracing::warn!("All ratings neutral, falling back to unweighted mean");
            let mut mean = vec![0.0f32; dimension];
            for index in &resolved {
                if let Some(vector) = self.catalog.vector(*index) {
                    for (acc, value) in mean.iter_mut().zip(vector.iter()) {
                        *acc += value;
                    }
                }
            }
            let count = resolved.len() as f32;
            for value in mean.iter_mut() {
                *value /= count;
            }
            mean
        } else {
            accumulator
                .into_iter()
                .map(|value| value / total_weight)
                .collect()
        };

        tracing::debug!(items = resolved.len(), "Taste vector calculated");
        Some(profile)
    }
}
