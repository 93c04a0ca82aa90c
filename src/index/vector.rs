//! Vector index using RaBitQ
//!
//! Note: RaBitQ does not support incremental updates. We need to rebuild
//! the entire structure when adding new vectors. This wrapper manages:
//! - Normalized vector storage (kept for rebuilds and exact re-scoring)
//! - Id mapping (external u64 id <-> internal index)
//! - Distance-to-similarity conversion

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::Vector;
use crate::{Error, Result};

/// Seed for centroid selection. Builds from identical vector sets must
/// produce identical search results, including after a save/load cycle.
const CENTROID_SEED: u64 = 0x5EED;

/// Return an L2-normalized copy of `v`. Zero vectors are returned unchanged.
pub fn l2_normalized(v: &[f32]) -> Vector {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// ANN index over unit-normalized vectors.
///
/// Searches return cosine similarity computed as `1 - d^2 / 2` from the L2
/// distance `d`, which is exact on unit vectors. The RaBitQ structure only
/// nominates candidates; distances are recomputed against the stored
/// vectors so scores and ordering do not depend on quantization error.
#[derive(Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,

    /// Map from external id to internal vector index
    id_map: HashMap<u64, usize>,

    /// Reverse map from internal index to external id
    reverse_map: Vec<u64>,

    /// All vectors stored, L2-normalized (needed for rebuilding and scoring)
    vectors: Vec<Vector>,

    /// Whether the structure is out of date with respect to `vectors`
    #[serde(skip)]
    needs_rebuild: bool,

    /// The actual RaBitQ index (not serialized, rebuilt on load)
    #[serde(skip)]
    index: Option<rabitq::RaBitQ>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            id_map: HashMap::new(),
            reverse_map: Vec::new(),
            vectors: Vec::new(),
            needs_rebuild: false,
            index: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Add or replace a single vector (marks for rebuild).
    ///
    /// An id that is already present keeps its internal slot and has its
    /// vector overwritten in place.
    pub fn add(&mut self, id: u64, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::dimension_mismatch(self.dimension, vector.len()));
        }

        let normalized = l2_normalized(vector);
        if let Some(&internal_id) = self.id_map.get(&id) {
            self.vectors[internal_id] = normalized;
        } else {
            let internal_id = self.vectors.len();
            self.id_map.insert(id, internal_id);
            self.reverse_map.push(id);
            self.vectors.push(normalized);
        }

        self.needs_rebuild = true;
        Ok(())
    }

    /// Build or rebuild the RaBitQ structure over all stored vectors.
    pub fn build(&mut self) -> Result<()> {
        if self.vectors.is_empty() {
            self.needs_rebuild = false;
            return Ok(());
        }

        // RaBitQ requires dimension to be a multiple of 64
        let padded_dim = self.dimension.div_ceil(64) * 64;

        let temp_dir =
            std::env::temp_dir().join(format!("shelfwise_rabitq_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&temp_dir)
            .map_err(|e| Error::index(format!("Failed to create temp dir: {}", e)))?;

        let base_path = temp_dir.join("base.fvecs");
        let centroid_path = temp_dir.join("centroids.fvecs");

        self.write_fvecs(&base_path, &self.vectors, padded_dim)?;

        let k = (self.vectors.len() as f32).sqrt() as usize;
        let k = k.clamp(1, 256);
        let centroids = self.generate_centroids(k, padded_dim);
        self.write_fvecs(&centroid_path, &centroids, padded_dim)?;

        let rabitq_index = rabitq::RaBitQ::from_path(&base_path, &centroid_path);

        self.index = Some(rabitq_index);
        self.needs_rebuild = false;

        let _ = std::fs::remove_dir_all(&temp_dir);

        Ok(())
    }

    /// Search for the `top_k` most similar vectors.
    ///
    /// Returns `(id, similarity)` pairs sorted by descending similarity.
    /// An empty index yields an empty result; an unbuilt non-empty index
    /// is a writer-path bug and yields an error.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(u64, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::dimension_mismatch(self.dimension, query.len()));
        }

        if self.vectors.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        if self.needs_rebuild || self.index.is_none() {
            return Err(Error::index("index not built; call build() first"));
        }

        let index = self
            .index
            .as_ref()
            .ok_or_else(|| Error::index("index not built"))?;

        let normalized_query = l2_normalized(query);
        let padded_dim = self.dimension.div_ceil(64) * 64;
        let mut padded_query = normalized_query.clone();
        padded_query.resize(padded_dim, 0.0);

        let probe = (self.vectors.len() as f32).sqrt() as usize;
        let probe = probe.clamp(1, 256);

        // RaBitQ nominates candidates; over-fetch to absorb quantization noise
        let results = index.query(&padded_query, probe, top_k * 2, true);

        let mut scored: Vec<(u64, f32)> = results
            .into_iter()
            .filter_map(|(_, internal_id)| {
                let internal_id = internal_id as usize;
                let id = *self.reverse_map.get(internal_id)?;
                let stored = self.vectors.get(internal_id)?;
                let distance = l2_distance(&normalized_query, stored);
                // Exact on unit-normalized vectors
                let similarity = 1.0 - (distance * distance) / 2.0;
                Some((id, similarity))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored)
    }

    /// Serialize index state to bytes (the RaBitQ structure itself is
    /// rebuilt from the stored vectors on load)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::index(format!("Failed to serialize index: {}", e)))
    }

    /// Deserialize index state from bytes; the caller must `build()` before
    /// searching
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut index: Self = serde_json::from_slice(data)
            .map_err(|e| Error::index(format!("Failed to deserialize index: {}", e)))?;

        index.needs_rebuild = true;

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Write vectors to fvecs format (used by RaBitQ)
    fn write_fvecs(&self, path: &std::path::Path, vectors: &[Vector], dim: usize) -> Result<()> {
        use std::io::Write;

        let mut file = std::fs::File::create(path)
            .map_err(|e| Error::index(format!("Failed to create fvecs file: {}", e)))?;

        for vector in vectors {
            let dim_bytes = (dim as u32).to_le_bytes();
            file.write_all(&dim_bytes)
                .map_err(|e| Error::index(format!("Failed to write dimension: {}", e)))?;

            for i in 0..dim {
                let value = if i < vector.len() { vector[i] } else { 0.0 };
                let value_bytes = value.to_le_bytes();
                file.write_all(&value_bytes)
                    .map_err(|e| Error::index(format!("Failed to write vector value: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Generate centroids using k-means++ style farthest-point selection
    fn generate_centroids(&self, k: usize, dim: usize) -> Vec<Vector> {
        if self.vectors.is_empty() {
            return Vec::new();
        }

        let k = k.min(self.vectors.len());

        let mut centroids = Vec::with_capacity(k);
        let mut rng = fastrand::Rng::with_seed(CENTROID_SEED);

        let first_idx = rng.usize(..self.vectors.len());
        let mut first = self.vectors[first_idx].clone();
        first.resize(dim, 0.0);
        centroids.push(first);

        for _ in 1..k {
            let mut max_dist = 0.0;
            let mut farthest_idx = 0;

            for (idx, vec) in self.vectors.iter().enumerate() {
                let mut min_dist = f32::MAX;
                for centroid in &centroids {
                    let dist = l2_distance(vec, centroid);
                    min_dist = min_dist.min(dist);
                }

                if min_dist > max_dist {
                    max_dist = min_dist;
                    farthest_idx = idx;
                }
            }

            let mut new_centroid = self.vectors[farthest_idx].clone();
            new_centroid.resize(dim, 0.0);
            centroids.push(new_centroid);
        }

        centroids
    }
}

/// L2 distance between two vectors (shorter one padded with zeros)
fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().max(b.len());
    let mut sum = 0.0f32;
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0.0);
        let y = b.get(i).copied().unwrap_or(0.0);
        sum += (x - y) * (x - y);
    }
    sum.sqrt()
}
