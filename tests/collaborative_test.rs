//! Tests for the collaborative filtering strategy.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use shelfwise::catalog::VectorCatalog;
use shelfwise::config::EngineSection;
use shelfwise::history::MemoryInteractionProvider;
use shelfwise::profile::UserProfileIndex;
use shelfwise::recommend::CollaborativeFilteringRecommender;
use shelfwise::rerank::default_pipeline;
use shelfwise::types::{CatalogRecord, Interaction, RerankContext, UserProfile};

fn record(title: &str, vector: Vec<f32>) -> CatalogRecord {
    CatalogRecord {
        title: title.to_string(),
        vector,
        page_length: None,
        genres: BTreeSet::new(),
    }
}

fn catalog() -> Arc<VectorCatalog> {
    Arc::new(
        VectorCatalog::build(vec![
            record("Alpha", vec![1.0, 0.0]),
            record("Beta", vec![0.0, 1.0]),
            record("Gamma", vec![0.71, 0.71]),
            record("Delta", vec![0.6, 0.8]),
        ])
        .unwrap(),
    )
}

fn interaction(user_id: &str, title: &str, rating: f32) -> Interaction {
    Interaction {
        user_id: user_id.to_string(),
        title: title.to_string(),
        rating,
    }
}

fn recommender(
    catalog: Arc<VectorCatalog>,
    profiles: Vec<UserProfile>,
    interactions: Arc<MemoryInteractionProvider>,
) -> CollaborativeFilteringRecommender {
    let mut index = UserProfileIndex::new(catalog.dimension(), "profile_index");
    if !profiles.is_empty() {
        index.build(&profiles).unwrap();
    }
    CollaborativeFilteringRecommender::new(
        catalog,
        Arc::new(RwLock::new(index)),
        interactions,
        default_pipeline(&EngineSection::default()),
    )
}

fn profile(user_id: &str, taste_vector: Vec<f32>) -> UserProfile {
    UserProfile {
        user_id: user_id.to_string(),
        taste_vector,
    }
}

/// Zero neighbors found is an empty result, not an error.
#[tokio::test]
async fn test_empty_index_yields_empty_list() {
    let catalog = catalog();
    let interactions = Arc::new(MemoryInteractionProvider::new());
    let recommender = recommender(catalog, Vec::new(), interactions);

    let titles = recommender
        .recommend(&vec![1.0, 0.0], 5, 10, Some("u1"), &RerankContext::default())
        .await
        .unwrap();
    assert!(titles.is_empty());
}

/// Items liked by closer neighbors outrank items liked by distant ones,
/// and the target's own rated items never come back.
#[tokio::test]
async fn test_neighbor_likes_are_weighted_by_similarity() {
    let catalog = catalog();

    let interactions = Arc::new(MemoryInteractionProvider::new());
    interactions.set_history(
        "u2",
        vec![
            interaction("u2", "Alpha", 5.0),
            interaction("u2", "Gamma", 5.0),
        ],
    );
    interactions.set_history(
        "u3",
        vec![
            interaction("u3", "Beta", 5.0),
            interaction("u3", "Delta", 4.0),
        ],
    );

    let profiles = vec![
        profile("u1", vec![1.0, 0.0]),
        profile("u2", vec![0.9, 0.1]),
        profile("u3", vec![0.1, 0.9]),
    ];
    let recommender = recommender(catalog, profiles, interactions);

    // u1 has read Alpha, so it is excluded from the result
    let ctx = RerankContext::excluding([0].into_iter().collect());
    let titles = recommender
        .recommend(&vec![1.0, 0.0], 3, 2, Some("u1"), &ctx)
        .await
        .unwrap();

    assert_eq!(titles[0], "Gamma");
    assert!(!titles.contains(&"Alpha".to_string()));
    assert_eq!(titles.len(), 3);
}

/// Ratings below the liked threshold contribute nothing.
#[tokio::test]
async fn test_neighbors_without_liked_items_yield_empty_list() {
    let catalog = catalog();

    let interactions = Arc::new(MemoryInteractionProvider::new());
    interactions.set_history(
        "u2",
        vec![
            interaction("u2", "Alpha", 3.0),
            interaction("u2", "Beta", 2.0),
        ],
    );

    let profiles = vec![profile("u2", vec![0.9, 0.1])];
    let recommender = recommender(catalog, profiles, interactions);

    let titles = recommender
        .recommend(
            &vec![1.0, 0.0],
            5,
            3,
            Some("u1"),
            &RerankContext::default(),
        )
        .await
        .unwrap();
    assert!(titles.is_empty());
}

/// An item liked by several neighbors compounds its score.
#[tokio::test]
async fn test_co_liked_items_compound() {
    let catalog = catalog();

    let interactions = Arc::new(MemoryInteractionProvider::new());
    // Both neighbors like Gamma; only the closer one likes Delta
    interactions.set_history("u2", vec![interaction("u2", "Gamma", 4.0)]);
    interactions.set_history(
        "u3",
        vec![
            interaction("u3", "Gamma", 4.0),
            interaction("u3", "Delta", 5.0),
        ],
    );

    let profiles = vec![
        profile("u2", vec![1.0, 0.0]),
        profile("u3", vec![0.9, 0.1]),
    ];
    let recommender = recommender(catalog, profiles, interactions);

    let titles = recommender
        .recommend(
            &vec![1.0, 0.0],
            2,
            2,
            None,
            &RerankContext::default(),
        )
        .await
        .unwrap();

    // Gamma: ~0.8 + ~0.8 from two neighbors beats Delta's single ~1.0
    assert_eq!(titles[0], "Gamma");
    assert_eq!(titles[1], "Delta");
}

/// A target without a stored profile can still query the index.
#[tokio::test]
async fn test_target_need_not_be_indexed() {
    let catalog = catalog();

    let interactions = Arc::new(MemoryInteractionProvider::new());
    interactions.set_history("u2", vec![interaction("u2", "Gamma", 5.0)]);

    let profiles = vec![profile("u2", vec![0.9, 0.1])];
    let recommender = recommender(catalog, profiles, interactions);

    let titles = recommender
        .recommend(
            &vec![1.0, 0.0],
            1,
            1,
            Some("stranger"),
            &RerankContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(titles, vec!["Gamma".to_string()]);
}
