//! Index management
//!
//! Hosts the RaBitQ-backed vector index wrapper shared by the catalog
//! index and the user-profile index.

pub mod vector;

pub use vector::{l2_normalized, VectorIndex};
