//! # echovault-core
//!
//! `MemoryService` ties the layers together: redaction before any
//! persistence, vault append before index upsert, hybrid search and
//! context assembly over the index, and reindex as the recovery path.

pub mod quality;
pub mod query;
pub mod service;

pub use query::{ContextBlock, SearchHit, SearchOutcome, SemanticStatus};
pub use service::{MemoryService, ReindexReport};
