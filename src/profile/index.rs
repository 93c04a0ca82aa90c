//! Dynamic nearest-neighbor index over user taste vectors
//!
//! Unlike the catalog index this structure mutates at serving time: new
//! profiles are added as users rate items. All vectors are L2-normalized
//! on the way in. The index and its string<->int id map are persisted as
//! two artifacts that must always be written and read together.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::index::VectorIndex;
use crate::storage::StorageBackend;
use crate::types::{UserProfile, Vector};
use crate::{Error, Result};

/// Extra neighbors fetched when a search excludes a user, compensating for
/// the excluded entry and any unmapped int ids. Best-effort: a shortfall
/// after filtering is returned as-is and logged.
const EXCLUDE_SEARCH_BUFFER: usize = 10;

/// Persisted companion to the index blob: the int<->string id map.
#[derive(Serialize, Deserialize)]
struct IdMapArtifact {
    saved_at: DateTime<Utc>,
    next_int_id: u64,
    users: Vec<IdMapEntry>,
}

#[derive(Serialize, Deserialize)]
struct IdMapEntry {
    int_id: u64,
    user_id: String,
}

pub struct UserProfileIndex {
    artifact_prefix: String,
    inner: VectorIndex,
    int_to_user: HashMap<u64, String>,
    user_to_int: HashMap<String, u64>,
    /// Append-only id counter; ids are never reused after removal. A
    /// profile replaced via `add` keeps its original id.
    next_int_id: u64,
}

impl UserProfileIndex {
    pub fn new(dimension: usize, artifact_prefix: impl Into<String>) -> Self {
        Self {
            artifact_prefix: artifact_prefix.into(),
            inner: VectorIndex::new(dimension),
            int_to_user: HashMap::new(),
            user_to_int: HashMap::new(),
            next_int_id: 0,
        }
    }

    fn index_key(&self) -> String {
        format!("{}/user_profiles.index", self.artifact_prefix)
    }

    fn map_key(&self) -> String {
        format!("{}/user_profiles.idmap", self.artifact_prefix)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.user_to_int.contains_key(user_id)
    }

    /// Build a fresh index from a batch of profiles, replacing any prior
    /// state. Int ids are assigned sequentially in input order; a rebuild
    /// is the only way the numbering changes.
    pub fn build(&mut self, profiles: &[UserProfile]) -> Result<()> {
        if profiles.is_empty() {
            tracing::warn!("Cannot build profile index from an empty profile list");
            return Ok(());
        }

        let mut inner = VectorIndex::new(self.inner.dimension());
        let mut int_to_user = HashMap::with_capacity(profiles.len());
        let mut user_to_int = HashMap::with_capacity(profiles.len());

        for (i, profile) in profiles.iter().enumerate() {
            let int_id = i as u64;
            inner.add(int_id, &profile.taste_vector)?;
            int_to_user.insert(int_id, profile.user_id.clone());
            user_to_int.insert(profile.user_id.clone(), int_id);
        }

        inner.build()?;

        self.inner = inner;
        self.int_to_user = int_to_user;
        self.user_to_int = user_to_int;
        self.next_int_id = profiles.len() as u64;

        tracing::info!(profiles = self.inner.len(), "User profile index built");
        Ok(())
    }

    /// Insert or replace one profile in the live index.
    ///
    /// A user that is already mapped keeps its int id and has its vector
    /// replaced in place; a new user gets the next sequential id. The ANN
    /// structure is rebuilt before returning so a concurrent reader (see
    /// the single-writer discipline in the facade) can never observe a
    /// half-inserted vector.
    pub fn add(&mut self, user_id: &str, vector: &Vector) -> Result<()> {
        let int_id = match self.user_to_int.get(user_id) {
            Some(&existing) => existing,
            None => {
                let id = self.next_int_id;
                self.next_int_id += 1;
                id
            }
        };

        self.inner.add(int_id, vector)?;
        self.inner.build()?;

        self.int_to_user.insert(int_id, user_id.to_string());
        self.user_to_int.insert(user_id.to_string(), int_id);

        tracing::info!(%user_id, int_id, "User profile added to live index");
        Ok(())
    }

    /// Find the `k` nearest profiles to a query vector.
    ///
    /// Returns `(user_id, similarity)` pairs in descending similarity
    /// order. When `exclude_user_id` is set the index over-fetches to
    /// compensate for the excluded entry; the excluded user never appears
    /// in the result, even as its own nearest neighbor.
    pub fn search(
        &self,
        query: &Vector,
        k: usize,
        exclude_user_id: Option<&str>,
    ) -> Result<Vec<(String, f32)>> {
        if k == 0 || self.inner.is_empty() {
            return Ok(Vec::new());
        }

        let fetch = if exclude_user_id.is_some() {
            k + EXCLUDE_SEARCH_BUFFER
        } else {
            k
        };

        let hits = self.inner.search(query, fetch)?;

        let mut neighbors = Vec::with_capacity(k);
        for (int_id, similarity) in hits {
            let Some(user_id) = self.int_to_user.get(&int_id) else {
                tracing::debug!(int_id, "Skipping int id with no user mapping");
                continue;
            };
            if exclude_user_id == Some(user_id.as_str()) {
                continue;
            }
            neighbors.push((user_id.clone(), similarity));
            if neighbors.len() == k {
                break;
            }
        }

        if neighbors.len() < k {
            tracing::debug!(
                requested = k,
                returned = neighbors.len(),
                "Neighbor search returned fewer results than requested"
            );
        }

        Ok(neighbors)
    }

    /// Persist the index and the id map as a pair.
    pub async fn save(&self, storage: &dyn StorageBackend) -> Result<()> {
        let index_bytes = self.inner.to_bytes()?;

        let mut users: Vec<IdMapEntry> = self
            .int_to_user
            .iter()
            .map(|(&int_id, user_id)| IdMapEntry {
                int_id,
                user_id: user_id.clone(),
            })
            .collect();
        users.sort_by_key(|entry| entry.int_id);

        let artifact = IdMapArtifact {
            saved_at: Utc::now(),
            next_int_id: self.next_int_id,
            users,
        };
        let map_bytes = serde_json::to_vec(&artifact)?;

        storage
            .put(&self.index_key(), Bytes::from(index_bytes))
            .await?;
        storage.put(&self.map_key(), Bytes::from(map_bytes)).await?;

        tracing::info!(
            profiles = self.inner.len(),
            prefix = %self.artifact_prefix,
            "User profile index persisted"
        );
        Ok(())
    }

    /// Load a previously saved index/id-map pair.
    ///
    /// Returns `Ok(false)` when neither artifact exists (index not yet
    /// built, caller should build from scratch). Exactly one artifact
    /// present is a corrupt pair and an error.
    pub async fn load(&mut self, storage: &dyn StorageBackend) -> Result<bool> {
        let index_key = self.index_key();
        let map_key = self.map_key();

        let have_index = storage.exists(&index_key).await?;
        let have_map = storage.exists(&map_key).await?;

        match (have_index, have_map) {
            (false, false) => {
                tracing::warn!(
                    prefix = %self.artifact_prefix,
                    "No persisted profile index found, a new index must be built"
                );
                return Ok(false);
            }
            (true, true) => {}
            _ => {
                return Err(Error::index(format!(
                    "profile index artifacts are incomplete under '{}': \
                     index and id map must exist together",
                    self.artifact_prefix
                )));
            }
        }

        let index_bytes = storage.get(&index_key).await?;
        let map_bytes = storage.get(&map_key).await?;

        let mut inner = VectorIndex::from_bytes(&index_bytes)?;
        inner.build()?;

        let artifact: IdMapArtifact = serde_json::from_slice(&map_bytes)?;

        let mut int_to_user = HashMap::with_capacity(artifact.users.len());
        let mut user_to_int = HashMap::with_capacity(artifact.users.len());
        for entry in artifact.users {
            int_to_user.insert(entry.int_id, entry.user_id.clone());
            user_to_int.insert(entry.user_id, entry.int_id);
        }

        self.inner = inner;
        self.int_to_user = int_to_user;
        self.user_to_int = user_to_int;
        self.next_int_id = artifact.next_int_id;

        tracing::info!(
            profiles = self.inner.len(),
            prefix = %self.artifact_prefix,
            "User profile index loaded"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(user_id: &str, taste_vector: Vec<f32>) -> UserProfile {
        UserProfile {
            user_id: user_id.to_string(),
            taste_vector,
        }
    }

    fn built_index() -> UserProfileIndex {
        let mut index = UserProfileIndex::new(2, "test_prefix");
        index
            .build(&[
                profile("u1", vec![1.0, 0.0]),
                profile("u2", vec![0.0, 1.0]),
                profile("u3", vec![0.9, 0.1]),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_search_excludes_self() {
        let index = built_index();

        // u1 is its own nearest neighbor, but must never be returned
        let neighbors = index.search(&vec![1.0, 0.0], 2, Some("u1")).unwrap();
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.iter().all(|(user, _)| user != "u1"));
        assert_eq!(neighbors[0].0, "u3");
    }

    #[test]
    fn test_search_without_exclusion() {
        let index = built_index();

        let neighbors = index.search(&vec![1.0, 0.0], 1, None).unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].0, "u1");
        assert!((neighbors[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_add_reuses_int_id_for_known_user() {
        let mut index = built_index();
        assert_eq!(index.len(), 3);

        index.add("u2", &vec![1.0, 0.0]).unwrap();
        assert_eq!(index.len(), 3);

        let neighbors = index.search(&vec![1.0, 0.0], 3, None).unwrap();
        let u2 = neighbors.iter().find(|(user, _)| user == "u2").unwrap();
        assert!((u2.1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_add_assigns_fresh_id_for_new_user() {
        let mut index = built_index();
        index.add("u4", &vec![0.5, 0.5]).unwrap();

        assert_eq!(index.len(), 4);
        assert!(index.contains_user("u4"));
    }

    #[test]
    fn test_add_to_empty_index() {
        let mut index = UserProfileIndex::new(2, "test_prefix");
        index.add("u1", &vec![1.0, 0.0]).unwrap();

        let neighbors = index.search(&vec![1.0, 0.0], 1, None).unwrap();
        assert_eq!(neighbors[0].0, "u1");
    }

    #[test]
    fn test_empty_index_search_is_empty() {
        let index = UserProfileIndex::new(2, "test_prefix");
        assert!(index.search(&vec![1.0, 0.0], 5, None).unwrap().is_empty());
    }
}
