//! # echovault-index
//!
//! The derived SQLite index over the vault: one row per live memory,
//! an FTS5 virtual table for lexical search, and per-row embedding
//! BLOBs for brute-force cosine search.
//!
//! The index is a cache. Every operation here must stay rebuildable
//! from the vault via [`IndexStore::rebuild`], which replaces the whole
//! content atomically.

pub mod error;
pub mod hybrid;
pub mod store;
pub mod vector;

pub use error::IndexError;
pub use hybrid::{merge_ranked, AGREEMENT_BONUS};
pub use store::IndexStore;
