//! Core types for shelfwise

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Dense catalog item id, assigned at catalog build time
pub type ItemId = u32;

/// Vector type
pub type Vector = Vec<f32>;

/// Rating value that contributes neither positive nor negative taste weight
pub const NEUTRAL_RATING: f32 = 3.0;

/// Ratings at or above this count as "liked"
pub const LIKED_RATING: f32 = 4.0;

/// Ratings at or below this count as "disliked"
pub const DISLIKED_RATING: f32 = 2.0;

/// A raw catalog row as supplied by the catalog source.
///
/// The content vector comes from an upstream text-embedding step; its
/// dimensionality fixes the catalog dimensionality D for everything built
/// on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub title: String,
    pub vector: Vector,
    #[serde(default)]
    pub page_length: Option<f64>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
}

/// A catalog item after indexing: the record plus its dense id.
///
/// `index` is unique and stable for the lifetime of one built catalog;
/// rebuilding the catalog reassigns indices.
#[derive(Debug, Clone)]
pub struct ItemVector {
    pub index: ItemId,
    pub title: String,
    pub vector: Vector,
    pub page_length: Option<f64>,
    pub genres: BTreeSet<String>,
}

/// A single user-item interaction, as reported by the history provider.
///
/// Ratings are in [0, 5]; items are referenced by title and resolved at the
/// catalog boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub title: String,
    pub rating: f32,
}

impl Interaction {
    pub fn is_liked(&self) -> bool {
        self.rating >= LIKED_RATING
    }

    pub fn is_disliked(&self) -> bool {
        self.rating <= DISLIKED_RATING
    }
}

/// A user's taste profile. Replaced wholesale on every update, never patched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub taste_vector: Vector,
}

/// Per-request re-ranking inputs, built fresh for every recommendation call.
#[derive(Debug, Clone, Default)]
pub struct RerankContext {
    /// Item indices that must never appear in the result
    pub exclude: HashSet<ItemId>,
    /// Average page length of the user's liked items (0 = unknown)
    pub avg_page_length: f64,
    pub preferred_genres: HashSet<String>,
    pub disliked_genres: HashSet<String>,
}

impl RerankContext {
    pub fn excluding(exclude: HashSet<ItemId>) -> Self {
        Self {
            exclude,
            ..Default::default()
        }
    }
}
