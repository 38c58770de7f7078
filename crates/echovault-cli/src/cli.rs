//! CLI argument parsing for echovault.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use echovault_types::Category;

/// EchoVault
///
/// A local-first knowledge store for coding-agent sessions: an
/// append-only Markdown vault plus a derived search index.
#[derive(Parser, Debug)]
#[command(name = "echovault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the vault and index locations
    Init,

    /// Save a memory
    Save {
        /// One-line headline
        #[arg(long)]
        title: String,

        /// What happened / what was done
        #[arg(long)]
        what: String,

        /// Why it was done
        #[arg(long, default_value = "")]
        why: String,

        /// Observable impact
        #[arg(long, default_value = "")]
        impact: String,

        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// decision | pattern | bug | context | learning
        #[arg(long, default_value = "context")]
        category: Category,

        /// Comma-separated related file paths
        #[arg(long, value_delimiter = ',')]
        related_files: Vec<String>,

        /// Producing agent or tool
        #[arg(long, default_value = "cli")]
        source: String,

        /// Project key; bare `--project` uses the current directory name
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        project: Option<String>,

        /// Long-form details text
        #[arg(long, conflicts_with = "details_file")]
        details: Option<String>,

        /// Load details from a file
        #[arg(long)]
        details_file: Option<PathBuf>,

        /// Scaffold the recommended details sections when none supplied
        #[arg(long)]
        details_template: bool,
    },

    /// Search memories by keyword and meaning
    Search {
        /// Query text
        query: String,

        /// Project filter; bare `--project` uses the current directory name
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        project: Option<String>,

        /// Filter by producing agent or tool
        #[arg(long)]
        source: Option<String>,

        /// Maximum results
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show the full record for an id or unambiguous prefix
    Details {
        /// Memory id or prefix
        id: String,
    },

    /// Delete a memory from the vault and the index
    Delete {
        /// Memory id or prefix
        id: String,
    },

    /// Build the bounded context block for session start
    Context {
        /// Project key; bare `--project` uses the current directory name
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        project: Option<String>,

        /// Optional relevance query
        #[arg(long)]
        query: Option<String>,

        /// Filter by producing agent or tool
        #[arg(long)]
        source: Option<String>,

        /// Maximum pointers (defaults to context.max_pointers)
        #[arg(long)]
        limit: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value_t = ContextFormat::Plain)]
        format: ContextFormat,
    },

    /// List session files
    Sessions {
        /// Project filter
        #[arg(long)]
        project: Option<String>,

        /// Maximum sessions listed
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },

    /// Rebuild the index from the vault
    Reindex,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Persist the vault home in the global config
    SetHome {
        /// New vault home directory
        path: PathBuf,
    },

    /// Remove the persisted vault home
    ClearHome,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFormat {
    /// Plain pointer list
    Plain,
    /// `## Memory Context` Markdown block for AGENTS.md injection
    AgentsMd,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_save_parses_tags_and_category() {
        let cli = Cli::try_parse_from([
            "echovault",
            "save",
            "--title",
            "t",
            "--what",
            "w",
            "--tags",
            "auth,jwt",
            "--category",
            "decision",
        ])
        .unwrap();
        match cli.command {
            Commands::Save {
                tags, category, ..
            } => {
                assert_eq!(tags, vec!["auth", "jwt"]);
                assert_eq!(category, Category::Decision);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_bare_project_flag_means_infer() {
        let cli =
            Cli::try_parse_from(["echovault", "search", "query", "--project"]).unwrap();
        match cli.command {
            Commands::Search { project, .. } => assert_eq!(project, Some(String::new())),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_details_and_details_file_conflict() {
        let err = Cli::try_parse_from([
            "echovault",
            "save",
            "--title",
            "t",
            "--what",
            "w",
            "--details",
            "x",
            "--details-file",
            "y.md",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_category_is_rejected() {
        let err = Cli::try_parse_from([
            "echovault",
            "save",
            "--title",
            "t",
            "--what",
            "w",
            "--category",
            "musing",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_context_format_values() {
        let cli = Cli::try_parse_from([
            "echovault",
            "context",
            "--project",
            "p1",
            "--format",
            "agents-md",
        ])
        .unwrap();
        match cli.command {
            Commands::Context { format, .. } => assert_eq!(format, ContextFormat::AgentsMd),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::try_parse_from(["echovault", "config", "set-home", "/tmp/vault"]).unwrap();
        match cli.command {
            Commands::Config {
                command: Some(ConfigCommands::SetHome { path }),
            } => assert_eq!(path, PathBuf::from("/tmp/vault")),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
