//! Build-once item catalog
//!
//! The catalog owns every item vector plus its metadata (title, page
//! length, genre tags) and the title <-> index maps. It is built once per
//! model version and read-only at serving time.

use std::collections::HashMap;

use crate::types::{CatalogRecord, ItemId, ItemVector, Vector};
use crate::{Error, Result};

pub mod index;

pub use index::CatalogIndex;

/// Immutable collection of item vectors with title/index lookup.
#[derive(Debug)]
pub struct VectorCatalog {
    dimension: usize,
    items: Vec<ItemVector>,
    title_to_index: HashMap<String, ItemId>,
}

impl VectorCatalog {
    /// Build a catalog from raw source records.
    ///
    /// Indices are assigned densely in input order. The first record fixes
    /// the dimensionality D; any later record with a different vector
    /// length is an upstream contract violation and fails the whole build.
    /// Duplicate titles keep the first occurrence.
    pub fn build(records: Vec<CatalogRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::catalog("cannot build catalog from zero records"));
        }

        let dimension = records[0].vector.len();
        if dimension == 0 {
            return Err(Error::catalog("catalog vectors must be non-empty"));
        }

        let mut items = Vec::with_capacity(records.len());
        let mut title_to_index = HashMap::with_capacity(records.len());

        for record in records {
            if record.vector.len() != dimension {
                return Err(Error::dimension_mismatch(dimension, record.vector.len()));
            }

            if title_to_index.contains_key(&record.title) {
                tracing::warn!(title = %record.title, "Duplicate catalog title, keeping first");
                continue;
            }

            let index = items.len() as ItemId;
            title_to_index.insert(record.title.clone(), index);
            items.push(ItemVector {
                index,
                title: record.title,
                vector: record.vector,
                page_length: record.page_length,
                genres: record.genres,
            });
        }

        tracing::info!(items = items.len(), dimension, "Catalog built");

        Ok(Self {
            dimension,
            items,
            title_to_index,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ItemVector] {
        &self.items
    }

    pub fn item(&self, index: ItemId) -> Option<&ItemVector> {
        self.items.get(index as usize)
    }

    /// Raw (un-normalized) vector access
    pub fn vector(&self, index: ItemId) -> Option<&Vector> {
        self.items.get(index as usize).map(|item| &item.vector)
    }

    pub fn index_of(&self, title: &str) -> Option<ItemId> {
        self.title_to_index.get(title).copied()
    }

    pub fn title_of(&self, index: ItemId) -> Option<&str> {
        self.items.get(index as usize).map(|item| item.title.as_str())
    }

    /// Resolve titles to indices, skipping and logging any unknown title.
    pub fn resolve_titles<S: AsRef<str>>(&self, titles: &[S]) -> Vec<ItemId> {
        let mut indices = Vec::with_capacity(titles.len());
        for title in titles {
            match self.index_of(title.as_ref()) {
                Some(index) => indices.push(index),
                None => {
                    tracing::warn!(title = %title.as_ref(), "Title not found in catalog, skipping")
                }
            }
        }
        indices
    }
}
