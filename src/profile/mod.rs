//! User taste profiles
//!
//! Taste-vector construction, profile persistence and the dynamic
//! nearest-neighbor index over user profiles.

pub mod index;
pub mod store;
pub mod taste;

pub use index::UserProfileIndex;
pub use store::{MemoryProfileStore, ProfileStore, StorageProfileStore};
pub use taste::TasteVectorCalculator;
