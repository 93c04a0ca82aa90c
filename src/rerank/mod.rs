//! Score re-ranking pipeline
//!
//! Re-rankers adjust the scores of an already-ranked candidate set using
//! signals the primary similarity search ignores (genre taste, preferred
//! book length). A re-ranker never adds or removes candidates, only
//! replaces scores and resorts. The pipeline is a strict left-to-right
//! fold: each stage receives the previous stage's output.

use crate::catalog::VectorCatalog;
use crate::config::EngineSection;
use crate::types::{ItemId, RerankContext};

/// Relative half-width of the page-length bonus band: items within +-20%
/// of the user's average liked length qualify.
const PAGE_BAND_TOLERANCE: f64 = 0.2;

pub trait ReRanker: Send + Sync {
    fn rerank(
        &self,
        candidates: Vec<(ItemId, f32)>,
        catalog: &VectorCatalog,
        ctx: &RerankContext,
    ) -> Vec<(ItemId, f32)>;
}

/// Run candidates through every re-ranker in order.
pub fn apply_pipeline(
    rerankers: &[Box<dyn ReRanker>],
    mut candidates: Vec<(ItemId, f32)>,
    catalog: &VectorCatalog,
    ctx: &RerankContext,
) -> Vec<(ItemId, f32)> {
    for reranker in rerankers {
        candidates = reranker.rerank(candidates, catalog, ctx);
    }
    candidates
}

/// The default pipeline in its configured order.
pub fn default_pipeline(engine: &EngineSection) -> Vec<Box<dyn ReRanker>> {
    vec![
        Box::new(GenrePreferenceReRanker::new(engine.genre_weight)),
        Box::new(PageCountReRanker::new(engine.page_weight)),
    ]
}

/// Stable sort by descending score; equal scores keep their prior order.
fn sort_by_score(candidates: &mut [(ItemId, f32)]) {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
}

/// Rewards items carrying the user's preferred genres and penalizes items
/// carrying disliked ones.
pub struct GenrePreferenceReRanker {
    weight: f32,
}

impl GenrePreferenceReRanker {
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl ReRanker for GenrePreferenceReRanker {
    fn rerank(
        &self,
        candidates: Vec<(ItemId, f32)>,
        catalog: &VectorCatalog,
        ctx: &RerankContext,
    ) -> Vec<(ItemId, f32)> {
        if ctx.preferred_genres.is_empty() && ctx.disliked_genres.is_empty() {
            return candidates;
        }

        let mut reranked: Vec<(ItemId, f32)> = candidates
            .into_iter()
            .map(|(index, score)| {
                let bonus = match catalog.item(index) {
                    Some(item) if !item.genres.is_empty() => {
                        let preferred = item
                            .genres
                            .iter()
                            .filter(|genre| ctx.preferred_genres.contains(*genre))
                            .count() as i64;
                        let disliked = item
                            .genres
                            .iter()
                            .filter(|genre| ctx.disliked_genres.contains(*genre))
                            .count() as i64;
                        (preferred - disliked) as f32 * self.weight
                    }
                    _ => 0.0,
                };
                (index, score + bonus)
            })
            .collect();

        sort_by_score(&mut reranked);
        reranked
    }
}

/// Rewards items whose page length is close to the average length of the
/// user's liked items.
///
/// The bonus peaks at `weight` exactly at the average and decays linearly
/// to zero at the band edges (+-20% of the average). Items outside the
/// band, items without a known length, and requests without a valid
/// average get no bonus.
pub struct PageCountReRanker {
    weight: f32,
}

impl PageCountReRanker {
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }

    fn bonus(&self, page_length: Option<f64>, avg: f64) -> f32 {
        let Some(length) = page_length else {
            return 0.0;
        };
        if length <= 0.0 {
            return 0.0;
        }

        let diff_ratio = (length - avg).abs() / avg;
        if diff_ratio >= PAGE_BAND_TOLERANCE {
            return 0.0;
        }

        (self.weight as f64 * (1.0 - diff_ratio / PAGE_BAND_TOLERANCE)) as f32
    }
}

impl ReRanker for PageCountReRanker {
    fn rerank(
        &self,
        candidates: Vec<(ItemId, f32)>,
        catalog: &VectorCatalog,
        ctx: &RerankContext,
    ) -> Vec<(ItemId, f32)> {
        if ctx.avg_page_length <= 0.0 {
            return candidates;
        }

        let mut reranked: Vec<(ItemId, f32)> = candidates
            .into_iter()
            .map(|(index, score)| {
                let page_length = catalog.item(index).and_then(|item| item.page_length);
                let bonus = self.bonus(page_length, ctx.avg_page_length);
                (index, score + bonus)
            })
            .collect();

        sort_by_score(&mut reranked);
        reranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CatalogRecord;
    use std::collections::{BTreeSet, HashSet};

    fn record(
        title: &str,
        page_length: Option<f64>,
        genres: &[&str],
    ) -> CatalogRecord {
        CatalogRecord {
            title: title.to_string(),
            vector: vec![1.0, 0.0],
            page_length,
            genres: genres.iter().map(|g| g.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn catalog() -> VectorCatalog {
        VectorCatalog::build(vec![
            record("Short", Some(120.0), &["fantasy"]),
            record("Average", Some(300.0), &["fantasy", "adventure"]),
            record("EdgeOfBand", Some(360.0), &["horror"]),
            record("Long", Some(500.0), &[]),
        ])
        .unwrap()
    }

    fn genres(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_page_bonus_peaks_at_average() {
        let reranker = PageCountReRanker::new(0.25);
        assert!((reranker.bonus(Some(300.0), 300.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_page_bonus_zero_at_band_edge() {
        let reranker = PageCountReRanker::new(0.25);
        // 20% over the average sits exactly on the band edge
        assert_eq!(reranker.bonus(Some(360.0), 300.0), 0.0);
    }

    #[test]
    fn test_page_bonus_zero_outside_band() {
        let reranker = PageCountReRanker::new(0.25);
        assert_eq!(reranker.bonus(Some(500.0), 300.0), 0.0);
        assert_eq!(reranker.bonus(None, 300.0), 0.0);
    }

    #[test]
    fn test_page_bonus_decays_linearly() {
        let reranker = PageCountReRanker::new(0.25);
        let halfway = reranker.bonus(Some(330.0), 300.0);
        assert!((halfway - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_page_reranker_promotes_in_band_items() {
        let catalog = catalog();
        let reranker = PageCountReRanker::new(0.25);
        let ctx = RerankContext {
            avg_page_length: 300.0,
            ..Default::default()
        };

        let candidates = vec![(3, 0.9), (1, 0.8)];
        let reranked = reranker.rerank(candidates, &catalog, &ctx);

        // "Average" gains the full bonus and overtakes "Long"
        assert_eq!(reranked[0].0, 1);
        assert!((reranked[0].1 - 1.05).abs() < 1e-6);
        assert_eq!(reranked[1], (3, 0.9));
    }

    #[test]
    fn test_genre_reranker_no_op_without_preferences() {
        let catalog = catalog();
        let reranker = GenrePreferenceReRanker::new(0.3);
        let ctx = RerankContext::default();

        let candidates = vec![(0, 0.5), (1, 0.4)];
        let reranked = reranker.rerank(candidates.clone(), &catalog, &ctx);
        assert_eq!(reranked, candidates);
    }

    #[test]
    fn test_genre_reranker_bonus_and_malus() {
        let catalog = catalog();
        let reranker = GenrePreferenceReRanker::new(0.3);
        let ctx = RerankContext {
            preferred_genres: genres(&["fantasy", "adventure"]),
            disliked_genres: genres(&["horror"]),
            ..Default::default()
        };

        let candidates = vec![(2, 0.9), (1, 0.5)];
        let reranked = reranker.rerank(candidates, &catalog, &ctx);

        // "Average" matches two preferred genres (+0.6); "EdgeOfBand"
        // matches one disliked genre (-0.3)
        assert_eq!(reranked[0].0, 1);
        assert!((reranked[0].1 - 1.1).abs() < 1e-6);
        assert_eq!(reranked[1].0, 2);
        assert!((reranked[1].1 - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_rerankers_preserve_candidate_set() {
        let catalog = catalog();
        let ctx = RerankContext {
            avg_page_length: 300.0,
            preferred_genres: genres(&["fantasy"]),
            disliked_genres: genres(&["horror"]),
            ..Default::default()
        };

        let candidates = vec![(0, 0.7), (1, 0.6), (2, 0.5), (3, 0.4)];
        let engine = EngineSection::default();
        let pipeline = default_pipeline(&engine);
        let reranked = apply_pipeline(&pipeline, candidates.clone(), &catalog, &ctx);

        let mut before: Vec<ItemId> = candidates.iter().map(|(index, _)| *index).collect();
        let mut after: Vec<ItemId> = reranked.iter().map(|(index, _)| *index).collect();
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }
}
