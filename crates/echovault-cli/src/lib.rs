//! Echovault CLI library exports.
//!
//! - `cli`: command-line argument parsing with clap
//! - `commands`: command implementations

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, ConfigCommands, ContextFormat};
