//! ANN index over catalog item vectors
//!
//! Built once from a [`VectorCatalog`] and immutable afterwards, so it is
//! safe for unlimited concurrent readers without locking.

use crate::catalog::VectorCatalog;
use crate::index::VectorIndex;
use crate::types::{ItemId, Vector};
use crate::Result;

pub struct CatalogIndex {
    inner: VectorIndex,
}

impl CatalogIndex {
    /// Build the index over all catalog vectors in one pass.
    pub fn build(catalog: &VectorCatalog) -> Result<Self> {
        let mut inner = VectorIndex::new(catalog.dimension());
        for item in catalog.items() {
            inner.add(u64::from(item.index), &item.vector)?;
        }
        inner.build()?;

        tracing::info!(items = inner.len(), "Catalog index built");
        Ok(Self { inner })
    }

    /// k-NN query by vector; results are `(item index, cosine similarity)`
    /// sorted by descending similarity. Every returned index is a valid
    /// catalog index.
    pub fn search(&self, query: &Vector, top_k: usize) -> Result<Vec<(ItemId, f32)>> {
        let hits = self.inner.search(query, top_k)?;
        Ok(hits
            .into_iter()
            .map(|(id, similarity)| (id as ItemId, similarity))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
