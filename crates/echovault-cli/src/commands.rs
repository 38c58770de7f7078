//! Command implementations.
//!
//! Handlers print to stdout; diagnostics go to stderr through tracing
//! so scripted callers can parse output.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use echovault_core::{quality, ContextBlock, MemoryService, SearchOutcome};
use echovault_types::{
    clear_persisted_home, set_persisted_home, Category, Memory, MemoryDraft, MemoryError,
    Settings,
};

use crate::cli::{Commands, ConfigCommands, ContextFormat};

/// Initialize tracing to stderr. RUST_LOG wins, then the CLI flag,
/// then `warn`.
pub fn init_tracing(log_level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.unwrap_or("warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatch one parsed command.
pub async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Init => handle_init(),
        Commands::Save {
            title,
            what,
            why,
            impact,
            tags,
            category,
            related_files,
            source,
            project,
            details,
            details_file,
            details_template,
        } => {
            let draft = build_draft(
                title,
                what,
                why,
                impact,
                tags,
                category,
                related_files,
                source,
                details,
                details_file,
                details_template,
            )?;
            handle_save(draft, resolve_project(project)?).await
        }
        Commands::Search {
            query,
            project,
            source,
            limit,
        } => handle_search(&query, optional_project(project)?, source.as_deref(), limit).await,
        Commands::Details { id } => handle_details(&id),
        Commands::Delete { id } => handle_delete(&id),
        Commands::Context {
            project,
            query,
            source,
            limit,
            format,
        } => {
            handle_context(
                resolve_project(project)?,
                query.as_deref(),
                source.as_deref(),
                limit,
                format,
            )
            .await
        }
        Commands::Sessions { project, limit } => handle_sessions(project.as_deref(), limit),
        Commands::Config { command } => handle_config(command),
        Commands::Reindex => handle_reindex().await,
    }
}

fn open_service() -> Result<MemoryService> {
    let settings = Settings::load()?;
    Ok(MemoryService::open(settings)?)
}

/// A bare `--project` (or none where one is required) resolves to the
/// current directory's name.
fn resolve_project(project: Option<String>) -> Result<String> {
    match project {
        Some(p) if !p.is_empty() => Ok(p),
        _ => current_dir_name(),
    }
}

/// For filters: absent means unscoped, bare means current directory.
fn optional_project(project: Option<String>) -> Result<Option<String>> {
    match project {
        None => Ok(None),
        Some(p) if !p.is_empty() => Ok(Some(p)),
        Some(_) => current_dir_name().map(Some),
    }
}

fn current_dir_name() -> Result<String> {
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    cwd.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| anyhow::anyhow!("current directory has no usable name; pass --project"))
}

#[allow(clippy::too_many_arguments)]
fn build_draft(
    title: String,
    what: String,
    why: String,
    impact: String,
    tags: Vec<String>,
    category: Category,
    related_files: Vec<String>,
    source: String,
    details: Option<String>,
    details_file: Option<PathBuf>,
    details_template: bool,
) -> Result<MemoryDraft> {
    let details = match (details, details_file) {
        (Some(text), None) => Some(text),
        (None, Some(path)) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read details file {}", path.display()))?,
        ),
        (None, None) if details_template => Some(quality::DETAILS_TEMPLATE.to_string()),
        (None, None) => None,
        // clap already rejects --details together with --details-file
        (Some(text), Some(_)) => Some(text),
    };
    Ok(MemoryDraft {
        title,
        what,
        why,
        impact,
        tags,
        category,
        related_files,
        source,
        details,
    })
}

fn handle_init() -> Result<()> {
    let service = open_service()?;
    let settings = service.settings();
    println!("Initialized echovault home at {}", settings.home.display());
    println!("  vault: {}", settings.vault_dir().display());
    println!("  index: {}", settings.index_path().display());
    println!("  home source: {}", settings.home_source);
    Ok(())
}

async fn handle_save(draft: MemoryDraft, project: String) -> Result<()> {
    let mut service = open_service()?;
    let receipt = service.save(draft, &project).await?;
    println!(
        "Saved memory {} ({}): {}",
        receipt.id, receipt.action, receipt.title
    );
    println!("  vault: {}", receipt.file_path.display());
    for warning in &receipt.warnings {
        println!("Warning: {warning}");
    }
    if let Some(warning) = &receipt.index_warning {
        println!("Warning: {warning}");
    }
    Ok(())
}

async fn handle_search(
    query: &str,
    project: Option<String>,
    source: Option<&str>,
    limit: usize,
) -> Result<()> {
    let service = open_service()?;
    let outcome = service
        .search(query, project.as_deref(), source, limit)
        .await?;
    print_search(&outcome);
    Ok(())
}

fn print_search(outcome: &SearchOutcome) {
    if outcome.hits.is_empty() {
        println!("No memories found.");
    } else {
        for hit in &outcome.hits {
            let summary = &hit.summary;
            println!(
                "{}  [{}]  {}  (score {:.2})",
                short_id(&summary.id),
                summary.category,
                summary.title,
                hit.score
            );
            println!("    {}", summary.excerpt);
        }
    }
    println!("Search mode: {}", outcome.semantic);
}

fn handle_details(id: &str) -> Result<()> {
    let service = open_service()?;
    match service.details(id) {
        Ok(memory) => {
            print_memory(&memory);
            Ok(())
        }
        Err(MemoryError::NotFound(id)) => {
            println!("No memory found matching '{id}'.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_memory(memory: &Memory) {
    println!("{}  [{}]  {}", memory.id, memory.category, memory.title);
    println!("  project: {}", memory.project);
    println!("  what: {}", memory.what);
    if !memory.why.is_empty() {
        println!("  why: {}", memory.why);
    }
    if !memory.impact.is_empty() {
        println!("  impact: {}", memory.impact);
    }
    if !memory.tags.is_empty() {
        println!("  tags: {}", memory.tags.join(", "));
    }
    if !memory.related_files.is_empty() {
        println!("  related files: {}", memory.related_files.join(", "));
    }
    println!("  source: {}", memory.source);
    println!(
        "  saved: {} (updated {} times)",
        memory.created_at.to_rfc3339(),
        memory.updated_count
    );
    if let Some(details) = &memory.details {
        println!("\n{details}");
    }
}

fn handle_delete(id: &str) -> Result<()> {
    let mut service = open_service()?;
    match service.delete(id) {
        Ok(memory) => {
            println!("Deleted '{}' ({})", memory.title, memory.id);
            Ok(())
        }
        Err(MemoryError::NotFound(id)) => {
            println!("No memory found matching '{id}'.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_context(
    project: String,
    query: Option<&str>,
    source: Option<&str>,
    limit: Option<usize>,
    format: ContextFormat,
) -> Result<()> {
    let service = open_service()?;
    let block = service.context(&project, query, source, limit).await?;
    match format {
        ContextFormat::Plain => print_context_plain(&block),
        ContextFormat::AgentsMd => print_context_agents_md(&block),
    }
    Ok(())
}

fn print_context_plain(block: &ContextBlock) {
    if block.pointers.is_empty() {
        println!("No memories for project '{}' yet.", block.project);
        return;
    }
    println!(
        "Memory context for {} ({} pointers):",
        block.project,
        block.pointers.len()
    );
    for pointer in &block.pointers {
        println!(
            "- [{}] {} ({}): {}",
            pointer.category,
            pointer.title,
            short_id(&pointer.id),
            pointer.excerpt
        );
    }
}

fn print_context_agents_md(block: &ContextBlock) {
    println!("## Memory Context");
    println!();
    if block.pointers.is_empty() {
        println!("No saved memories for this project yet.");
        return;
    }
    for pointer in &block.pointers {
        let details_hint = if pointer.has_details {
            format!(" (details: `echovault details {}`)", short_id(&pointer.id))
        } else {
            String::new()
        };
        println!(
            "- **{}** [{}]: {}{}",
            pointer.title, pointer.category, pointer.excerpt, details_hint
        );
    }
}

fn handle_sessions(project: Option<&str>, limit: usize) -> Result<()> {
    let service = open_service()?;
    let sessions = service.sessions(project, limit)?;
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }
    for session in sessions {
        println!(
            "{}  {}  {} entries  {}",
            session.date,
            session.project,
            session.entry_count,
            session.path.display()
        );
    }
    Ok(())
}

fn handle_config(command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None => {
            let settings = Settings::load()?;
            println!("home = {} (source: {})", settings.home.display(), settings.home_source);
            println!("vault = {}", settings.vault_dir().display());
            println!("index = {}", settings.index_path().display());
            println!();
            println!("[embedding]");
            println!("provider = \"{}\"", settings.embedding.provider);
            println!("model = \"{}\"", settings.embedding.model);
            println!("base_url = \"{}\"", settings.embedding.base_url);
            println!("api_key = {}", settings.embedding.masked_api_key());
            println!();
            println!("[enrichment]");
            println!("provider = \"{}\"", settings.enrichment.provider);
            println!();
            println!("[context]");
            println!("semantic = \"{}\"", settings.context.semantic.as_str());
            println!("topup_recent = {}", settings.context.topup_recent);
            println!("max_pointers = {}", settings.context.max_pointers);
            Ok(())
        }
        Some(ConfigCommands::SetHome { path }) => {
            let stored = set_persisted_home(&path)?;
            std::fs::create_dir_all(stored.join("vault"))
                .with_context(|| format!("cannot create vault layout at {}", stored.display()))?;
            println!("Vault home set to {}", stored.display());
            Ok(())
        }
        Some(ConfigCommands::ClearHome) => {
            if clear_persisted_home()? {
                println!("Persisted vault home cleared.");
            } else {
                println!("No persisted vault home was set.");
            }
            Ok(())
        }
    }
}

async fn handle_reindex() -> Result<()> {
    let mut service = open_service()?;
    debug!("starting reindex");
    let report = service.reindex().await?;
    println!(
        "Reindexed {} memories ({} embedded, {} lexical-only).",
        report.total, report.embedded, report.embed_failures
    );
    Ok(())
}

fn short_id(id: &str) -> &str {
    if id.len() >= 8 {
        &id[..8]
    } else {
        id
    }
}
