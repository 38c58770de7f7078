//! # echovault-vault
//!
//! The Markdown vault: append-only session files, one per
//! (project, local date), holding the durable record of every memory.
//!
//! Each entry is written twice inside delimiter comments: a
//! human-readable Markdown block for people, and a canonical JSON
//! payload for machines. The parser reads only the payload, so the
//! write/parse pair is a lossless inverse for arbitrary field content.
//!
//! Appends are serialized per session file with a sibling `.lock` file
//! and a bounded wait. Deletes remove exactly the targeted entry's byte
//! range and leave every other byte intact.

pub mod entry;
pub mod error;
pub mod lock;
pub mod store;

pub use error::VaultError;
pub use store::{SessionInfo, VaultStore};
