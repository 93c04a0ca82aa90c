//! Content-based recommendation
//!
//! Finds catalog items whose vectors are closest to a profile vector, then
//! runs the candidates through the re-ranking pipeline.

use std::sync::Arc;

use crate::catalog::{CatalogIndex, VectorCatalog};
use crate::rerank::{self, ReRanker};
use crate::types::{ItemId, RerankContext, Vector};
use crate::Result;

/// How many candidates to pull from the ANN index per requested result.
/// Similarity-ranked ANN results are imprecise near the boundary and both
/// exclusion and re-ranking remove candidates, so the pool is generous.
const CANDIDATE_POOL_FACTOR: usize = 20;

pub struct ContentBasedRecommender {
    catalog: Arc<VectorCatalog>,
    index: Arc<CatalogIndex>,
    rerankers: Vec<Box<dyn ReRanker>>,
}

impl ContentBasedRecommender {
    pub fn new(
        catalog: Arc<VectorCatalog>,
        index: Arc<CatalogIndex>,
        rerankers: Vec<Box<dyn ReRanker>>,
    ) -> Self {
        Self {
            catalog,
            index,
            rerankers,
        }
    }

    /// Recommend the `top_n` titles most similar to a profile vector.
    ///
    /// Candidates in `ctx.exclude` are dropped before re-ranking. Equal
    /// final scores keep the ANN return order (stable sort); that ordering
    /// is the one accepted non-determinism of this method.
    pub fn recommend_by_profile(
        &self,
        profile: &Vector,
        top_n: usize,
        ctx: &RerankContext,
    ) -> Result<Vec<String>> {
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let pool_size = top_n * CANDIDATE_POOL_FACTOR;
        let hits = self.index.search(profile, pool_size)?;

        let candidates: Vec<(ItemId, f32)> = hits
            .into_iter()
            .filter(|(index, _)| !ctx.exclude.contains(index))
            .collect();

        let reranked = rerank::apply_pipeline(&self.rerankers, candidates, &self.catalog, ctx);

        Ok(reranked
            .into_iter()
            .take(top_n)
            .filter_map(|(index, _)| self.catalog.title_of(index).map(str::to_string))
            .collect())
    }

    /// Recommend titles similar to a set of seed titles.
    ///
    /// Unknown titles are skipped and logged. The profile is the simple
    /// mean of the seed vectors (this path has no ratings to weight by)
    /// and the seeds themselves are excluded from the result.
    pub fn recommend_by_titles(&self, titles: &[String], top_n: usize) -> Result<Vec<String>> {
        let indices = self.catalog.resolve_titles(titles);
        if indices.is_empty() {
            tracing::warn!("None of the seed titles resolved, no recommendations");
            return Ok(Vec::new());
        }

        let dimension = self.catalog.dimension();
        let mut profile = vec![0.0f32; dimension];
        for index in &indices {
            if let Some(vector) = self.catalog.vector(*index) {
                for (acc, value) in profile.iter_mut().zip(vector.iter()) {
                    *acc += value;
                }
            }
        }
        let count = indices.len() as f32;
        for value in profile.iter_mut() {
            *value /= count;
        }

        let ctx = RerankContext::excluding(indices.into_iter().collect());
        self.recommend_by_profile(&profile, top_n, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSection;
    use crate::rerank::default_pipeline;
    use crate::types::CatalogRecord;
    use std::collections::BTreeSet;

    fn recommender() -> ContentBasedRecommender {
        let records = vec![
            CatalogRecord {
                title: "Alpha".to_string(),
                vector: vec![1.0, 0.0],
                page_length: None,
                genres: BTreeSet::new(),
            },
            CatalogRecord {
                title: "Beta".to_string(),
                vector: vec![0.0, 1.0],
                page_length: None,
                genres: BTreeSet::new(),
            },
            CatalogRecord {
                title: "Gamma".to_string(),
                vector: vec![0.71, 0.71],
                page_length: None,
                genres: BTreeSet::new(),
            },
        ];
        let catalog = Arc::new(VectorCatalog::build(records).unwrap());
        let index = Arc::new(CatalogIndex::build(&catalog).unwrap());
        let pipeline = default_pipeline(&EngineSection::default());
        ContentBasedRecommender::new(catalog, index, pipeline)
    }

    #[test]
    fn test_profile_recommendation_excludes_rated_items() {
        let recommender = recommender();

        // Taste profile of a user who loved Alpha and hated Beta
        let profile = vec![1.0, -1.0];
        let ctx = RerankContext::excluding([0, 1].into_iter().collect());

        let titles = recommender.recommend_by_profile(&profile, 1, &ctx).unwrap();
        assert_eq!(titles, vec!["Gamma".to_string()]);
    }

    #[test]
    fn test_excluded_items_never_returned() {
        let recommender = recommender();
        let profile = vec![1.0, 0.0];
        let ctx = RerankContext::excluding([0].into_iter().collect());

        let titles = recommender.recommend_by_profile(&profile, 3, &ctx).unwrap();
        assert!(!titles.contains(&"Alpha".to_string()));
        assert_eq!(titles.len(), 2);
    }

    #[test]
    fn test_recommend_by_titles_skips_unknown_seeds() {
        let recommender = recommender();

        let titles = recommender
            .recommend_by_titles(
                &["Alpha".to_string(), "DoesNotExist".to_string()],
                2,
            )
            .unwrap();

        assert!(!titles.contains(&"Alpha".to_string()));
        assert!(!titles.is_empty());
    }

    #[test]
    fn test_recommend_by_titles_with_no_resolvable_seed() {
        let recommender = recommender();
        let titles = recommender
            .recommend_by_titles(&["Unknown".to_string()], 5)
            .unwrap();
        assert!(titles.is_empty());
    }

    #[test]
    fn test_zero_top_n() {
        let recommender = recommender();
        let titles = recommender
            .recommend_by_profile(&vec![1.0, 0.0], 0, &RerankContext::default())
            .unwrap();
        assert!(titles.is_empty());
    }
}
