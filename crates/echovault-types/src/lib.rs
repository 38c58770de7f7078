//! # echovault-types
//!
//! Shared domain types for EchoVault.
//!
//! This crate defines the core data structures used throughout the system:
//! - Memories: immutable structured notes saved by coding agents
//! - Settings: layered configuration and vault-home resolution
//! - Errors: the unified error taxonomy surfaced by every operation

pub mod config;
pub mod error;
pub mod memory;

pub use config::{
    clear_persisted_home, persisted_home, resolve_home, set_persisted_home, ContextSettings,
    EmbeddingSettings, EnrichmentSettings, HomeSource, ProviderKind, SemanticMode, Settings,
};
pub use error::MemoryError;
pub use memory::{Category, Memory, MemoryDraft, MemorySummary, SaveAction, SaveReceipt};
