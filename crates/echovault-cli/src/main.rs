//! echovault
//!
//! A local-first knowledge store for coding-agent sessions.
//!
//! # Usage
//!
//! ```bash
//! echovault init
//! echovault save --title "Switched to JWT auth" --what "..." --category decision
//! echovault search "auth tokens" --project api-server
//! echovault context --project api-server --format agents-md
//! echovault reindex
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (`<home>/config.toml`)
//! 3. Environment variables (`ECHOVAULT_*`)
//!
//! The home directory itself resolves from `ECHOVAULT_HOME`, then the
//! persisted global config, then `~/.echovault`.

use anyhow::Result;
use clap::Parser;

use echovault_cli::commands;
use echovault_cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_tracing(cli.log_level.as_deref());
    commands::run(cli.command).await
}
