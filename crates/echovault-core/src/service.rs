//! The memory service: every operation the CLI exposes, wired through
//! the fixed pipeline redact -> vault append -> index upsert.

use std::collections::HashMap;
use std::fs;

use tracing::{debug, info, warn};

use echovault_embeddings::{
    enricher_from_settings, provider_from_settings, EmbeddingProvider, Enricher,
};
use echovault_index::{merge_ranked, IndexStore};
use echovault_redact::redact;
use echovault_types::{
    Memory, MemoryDraft, MemoryError, SaveAction, SaveReceipt, SemanticMode, Settings,
};
use echovault_vault::{SessionInfo, VaultStore};

use crate::quality;
use crate::query::{ContextBlock, SearchHit, SearchOutcome, SemanticStatus};

/// Outcome of a reindex run.
#[derive(Debug, Clone, Copy)]
pub struct ReindexReport {
    /// Live memories replayed from the vault
    pub total: usize,
    /// Rows that received an embedding
    pub embedded: usize,
    /// Rows left lexical-only because the provider failed
    pub embed_failures: usize,
}

/// All state for one invocation: resolved settings plus the two stores
/// and the optional providers. No process-wide singletons; tests build
/// services against temporary homes.
pub struct MemoryService {
    settings: Settings,
    vault: VaultStore,
    index: IndexStore,
    provider: Option<Box<dyn EmbeddingProvider>>,
    enricher: Option<Box<dyn Enricher>>,
}

impl MemoryService {
    /// Open the service with providers selected by configuration.
    pub fn open(settings: Settings) -> Result<Self, MemoryError> {
        let provider = provider_from_settings(&settings.embedding)?;
        let enricher = enricher_from_settings(&settings.enrichment);
        Self::with_providers(settings, provider, enricher)
    }

    /// Open with explicit providers (tests inject the mock here).
    pub fn with_providers(
        settings: Settings,
        provider: Option<Box<dyn EmbeddingProvider>>,
        enricher: Option<Box<dyn Enricher>>,
    ) -> Result<Self, MemoryError> {
        fs::create_dir_all(&settings.home)?;
        let vault = VaultStore::new(settings.vault_dir());
        vault.ensure_layout()?;
        let index = IndexStore::open(&settings.index_path())?;
        Ok(Self {
            settings,
            vault,
            index,
            provider,
            enricher,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Rows in the index and how many carry embeddings.
    pub fn index_stats(&self) -> Result<(usize, usize), MemoryError> {
        Ok((self.index.count()?, self.index.embedded_count()?))
    }

    /// Save one memory. Redaction runs first, the vault append is the
    /// commit point, and an index failure after it degrades to a
    /// warning (the vault stays authoritative, `reindex` resyncs).
    pub async fn save(
        &mut self,
        draft: MemoryDraft,
        project: &str,
    ) -> Result<SaveReceipt, MemoryError> {
        if draft.title.trim().is_empty() {
            return Err(MemoryError::InvalidInput("title must not be empty".into()));
        }
        if draft.what.trim().is_empty() {
            return Err(MemoryError::InvalidInput("what must not be empty".into()));
        }
        if project.trim().is_empty() {
            return Err(MemoryError::InvalidInput("project must not be empty".into()));
        }

        let draft = redact_draft(draft);

        let (mut memory, action) = match self.index.find_by_title(project, &draft.title)? {
            Some(existing) => {
                let mut updated = Memory::from_draft(draft, project);
                updated.id = existing.id;
                updated.created_at = existing.created_at;
                updated.updated_count = existing.updated_count + 1;
                (updated, SaveAction::Updated)
            }
            None => (Memory::from_draft(draft, project), SaveAction::Created),
        };

        if let Some(enricher) = &self.enricher {
            match enricher.enrich(&memory.search_text(), &memory.tags).await {
                Ok(extra) => memory.tags.extend(extra),
                Err(e) => debug!(error = %e, "enrichment failed, saving without extra tags"),
            }
        }

        let warnings = quality::save_warnings(memory.category, memory.details.as_deref());

        let file_path = self.vault.append(&memory)?;

        let mut index_warning = None;
        let embedding = match &self.provider {
            Some(provider) => match provider.embed(&memory.search_text()).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    index_warning = Some(format!(
                        "embedding failed ({e}); this memory is lexical-only until reindex"
                    ));
                    None
                }
            },
            None => None,
        };
        if let Err(e) = self.index.upsert(&memory, embedding.as_deref()) {
            let msg = format!(
                "index update failed ({e}); run `echovault reindex` to resynchronize"
            );
            index_warning = Some(join_warning(index_warning.take(), msg));
        }

        info!(id = %memory.id, %action, project, "memory saved");
        Ok(SaveReceipt {
            id: memory.id,
            title: memory.title,
            action,
            file_path,
            warnings,
            index_warning,
        })
    }

    /// Resolve a full id or an unambiguous prefix to one memory.
    pub fn resolve(&self, id_or_prefix: &str) -> Result<Memory, MemoryError> {
        if let Some(memory) = self.index.get(id_or_prefix)? {
            return Ok(memory);
        }
        let mut matches = self.index.find_by_id_prefix(id_or_prefix)?.into_iter();
        match (matches.next(), matches.next()) {
            (Some(memory), None) => Ok(memory),
            (Some(a), Some(b)) => {
                let mut candidates = vec![a.id, b.id];
                candidates.extend(matches.map(|m| m.id));
                Err(MemoryError::AmbiguousId {
                    prefix: id_or_prefix.to_string(),
                    candidates,
                })
            }
            (None, _) => Err(MemoryError::NotFound(id_or_prefix.to_string())),
        }
    }

    /// Full record for `details <id>`.
    pub fn details(&self, id_or_prefix: &str) -> Result<Memory, MemoryError> {
        self.resolve(id_or_prefix)
    }

    /// Delete a memory from both representations. Returns the removed
    /// record.
    pub fn delete(&mut self, id_or_prefix: &str) -> Result<Memory, MemoryError> {
        let memory = self.resolve(id_or_prefix)?;
        self.vault.delete(&memory.id)?;
        self.index.delete(&memory.id)?;
        info!(id = %memory.id, "memory deleted");
        Ok(memory)
    }

    /// Hybrid search over the index.
    pub async fn search(
        &self,
        query: &str,
        project: Option<&str>,
        source: Option<&str>,
        limit: usize,
    ) -> Result<SearchOutcome, MemoryError> {
        let pool = limit.max(1) * 3;
        let lexical = self.index.lexical_search(query, project, source, pool)?;
        let (semantic, status) = self.semantic_results(query, project, source, pool).await?;

        let ids: Vec<String> = lexical
            .iter()
            .chain(semantic.iter())
            .map(|(id, _)| id.clone())
            .collect();
        let created = self.index.created_at_map(&ids)?;
        let merged = merge_ranked(&lexical, &semantic, &created, limit);

        let mut hits = Vec::new();
        for (id, score) in merged {
            if let Some(memory) = self.index.get(&id)? {
                hits.push(SearchHit {
                    summary: memory.summary(),
                    score,
                });
            }
        }
        Ok(SearchOutcome {
            hits,
            semantic: status,
        })
    }

    async fn semantic_results(
        &self,
        query: &str,
        project: Option<&str>,
        source: Option<&str>,
        pool: usize,
    ) -> Result<(Vec<(String, f64)>, SemanticStatus), MemoryError> {
        if self.settings.context.semantic == SemanticMode::Never {
            return Ok((Vec::new(), SemanticStatus::Disabled));
        }
        let provider = match &self.provider {
            Some(p) => p,
            // Under `always` the user asked for semantic search, so the
            // missing provider is a degradation, not a disabled feature.
            None if self.settings.context.semantic == SemanticMode::Always => {
                return Ok((
                    Vec::new(),
                    SemanticStatus::Skipped(
                        "semantic mode is 'always' but no embedding provider is configured"
                            .to_string(),
                    ),
                ))
            }
            None => return Ok((Vec::new(), SemanticStatus::Disabled)),
        };
        let vector = match provider.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "semantic search skipped");
                return Ok((
                    Vec::new(),
                    SemanticStatus::Skipped(format!("{} unavailable: {e}", provider.name())),
                ));
            }
        };
        match self.index.embedding_dim()? {
            None => Ok((
                Vec::new(),
                SemanticStatus::Skipped("no embedded memories in the index yet".to_string()),
            )),
            Some(dim) if dim != vector.len() => Ok((
                Vec::new(),
                SemanticStatus::Skipped(format!(
                    "index embeddings have dimension {dim} but {} returned {}; run `echovault reindex`",
                    provider.name(),
                    vector.len()
                )),
            )),
            Some(_) => {
                let hits = self.index.semantic_search(&vector, project, source, pool)?;
                Ok((hits, SemanticStatus::Used))
            }
        }
    }

    /// Bounded context for session start: matches first, then recency
    /// fill.
    pub async fn context(
        &self,
        project: &str,
        query: Option<&str>,
        source: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ContextBlock, MemoryError> {
        let bound = limit.unwrap_or(self.settings.context.max_pointers).max(1);
        let mut pointers = Vec::new();
        let mut semantic = SemanticStatus::Disabled;

        if let Some(query) = query {
            let outcome = self.search(query, Some(project), source, bound).await?;
            semantic = outcome.semantic;
            pointers.extend(outcome.hits.into_iter().map(|h| h.summary));
        }

        if self.settings.context.topup_recent || query.is_none() {
            for memory in self.index.recent(Some(project), source, bound)? {
                if pointers.len() >= bound {
                    break;
                }
                if pointers.iter().any(|p| p.id == memory.id) {
                    continue;
                }
                pointers.push(memory.summary());
            }
        }

        pointers.truncate(bound);
        Ok(ContextBlock {
            project: project.to_string(),
            pointers,
            semantic,
        })
    }

    /// Session files, newest first.
    pub fn sessions(
        &self,
        project: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SessionInfo>, MemoryError> {
        let mut sessions = self.vault.list_sessions(project)?;
        sessions.truncate(limit);
        Ok(sessions)
    }

    /// Rebuild the index from the vault. Entries for the same id fold
    /// last-wins, so replaying an append-only update history converges.
    pub async fn reindex(&mut self) -> Result<ReindexReport, MemoryError> {
        let replayed = self.vault.read_all()?;
        let mut order = Vec::new();
        let mut by_id: HashMap<String, Memory> = HashMap::new();
        for memory in replayed {
            if !by_id.contains_key(&memory.id) {
                order.push(memory.id.clone());
            }
            by_id.insert(memory.id.clone(), memory);
        }

        let mut entries = Vec::new();
        let mut embedded = 0;
        let mut embed_failures = 0;
        for id in &order {
            let Some(memory) = by_id.remove(id) else {
                continue;
            };
            let embedding = match &self.provider {
                Some(provider) => match provider.embed(&memory.search_text()).await {
                    Ok(vector) => {
                        embedded += 1;
                        Some(vector)
                    }
                    Err(e) => {
                        embed_failures += 1;
                        warn!(id = %memory.id, error = %e, "reindex embedding failed");
                        None
                    }
                },
                None => None,
            };
            entries.push((memory, embedding));
        }

        self.index.rebuild(&entries)?;
        Ok(ReindexReport {
            total: entries.len(),
            embedded,
            embed_failures,
        })
    }
}

/// Scrub every free-text field before anything else sees the draft.
fn redact_draft(mut draft: MemoryDraft) -> MemoryDraft {
    draft.title = redact(&draft.title);
    draft.what = redact(&draft.what);
    draft.why = redact(&draft.why);
    draft.impact = redact(&draft.impact);
    draft.details = draft.details.map(|d| redact(&d));
    draft.tags = draft.tags.iter().map(|t| redact(t)).collect();
    draft.related_files = draft.related_files.iter().map(|f| redact(f)).collect();
    draft
}

/// A save can degrade twice (embedding, then index upsert); keep every
/// message rather than the last one.
fn join_warning(prev: Option<String>, msg: String) -> String {
    match prev {
        Some(prev) => format!("{prev}; {msg}"),
        None => msg,
    }
}

#[cfg(test)]
mod tests {
    use super::join_warning;

    #[test]
    fn test_join_warning_keeps_earlier_message() {
        let first = "embedding failed (timeout); this memory is lexical-only until reindex";
        let second = "index update failed (disk full)";
        let joined = join_warning(Some(first.to_string()), second.to_string());
        assert!(joined.contains("embedding failed"));
        assert!(joined.contains("index update failed"));
        assert_eq!(join_warning(None, second.to_string()), second);
    }
}
