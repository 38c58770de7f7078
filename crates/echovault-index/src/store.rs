//! SQLite-backed index store: schema, row lifecycle, queries.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use echovault_types::{Category, Memory};

use crate::error::IndexError;
use crate::vector;

const META_EMBEDDING_DIM: &str = "embedding_dim";

/// The derived index over the vault. One writer at a time, concurrent
/// readers via WAL.
pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open (or create) the index database at the given path.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.configure()?;
        store.init_schema()?;
        debug!(path = %path.display(), "index opened");
        Ok(store)
    }

    /// In-memory index for tests.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn configure(&self) -> Result<(), IndexError> {
        // WAL: one writer, readers never block on it
        self.conn
            .pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "busy_timeout", 5000)?;
        Ok(())
    }

    fn init_schema(&self) -> Result<(), IndexError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                project TEXT NOT NULL,
                title TEXT NOT NULL,
                title_norm TEXT NOT NULL,
                what TEXT NOT NULL,
                why TEXT NOT NULL DEFAULT '',
                impact TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                category TEXT NOT NULL,
                related_files TEXT NOT NULL DEFAULT '[]',
                source TEXT NOT NULL DEFAULT 'cli',
                details TEXT,
                created_at TEXT NOT NULL,
                updated_count INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_memories_project_created
                ON memories(project, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_memories_title
                ON memories(project, title_norm);
            CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
                id UNINDEXED, title, what, why, impact, tags, details
            );
            CREATE TABLE IF NOT EXISTS embeddings (
                id TEXT PRIMARY KEY,
                vector BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Insert or replace the row for `memory.id`, including its
    /// full-text entry and (when provided) its embedding. A missing
    /// embedding removes any stale vector for the row.
    pub fn upsert(
        &mut self,
        memory: &Memory,
        embedding: Option<&[f32]>,
    ) -> Result<(), IndexError> {
        let tx = self.conn.transaction()?;
        insert_row(&tx, memory)?;
        tx.execute("DELETE FROM embeddings WHERE id = ?1", params![memory.id])?;
        if let Some(vec) = embedding {
            store_embedding(&tx, &memory.id, vec)?;
        }
        tx.commit()?;
        debug!(id = %memory.id, embedded = embedding.is_some(), "index row upserted");
        Ok(())
    }

    /// Remove the row and its search structures. Missing ids succeed
    /// silently.
    pub fn delete(&mut self, id: &str) -> Result<(), IndexError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM memories_fts WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM embeddings WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the entire index content with exactly the given set, in
    /// one transaction. Interrupting leaves the prior state intact.
    pub fn rebuild(
        &mut self,
        entries: &[(Memory, Option<Vec<f32>>)],
    ) -> Result<(), IndexError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM memories", [])?;
        tx.execute("DELETE FROM memories_fts", [])?;
        tx.execute("DELETE FROM embeddings", [])?;
        tx.execute("DELETE FROM meta WHERE key = ?1", params![META_EMBEDDING_DIM])?;
        for (memory, embedding) in entries {
            insert_row(&tx, memory)?;
            if let Some(vec) = embedding {
                store_embedding(&tx, &memory.id, vec)?;
            }
        }
        tx.commit()?;
        info!(rows = entries.len(), "index rebuilt");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Memory>, IndexError> {
        let memory = self
            .conn
            .prepare(&format!("{SELECT_MEMORY} WHERE id = ?1"))?
            .query_row(params![id], row_to_memory)
            .optional()?;
        Ok(memory)
    }

    /// All memories whose id starts with `prefix`, for prefix
    /// resolution.
    pub fn find_by_id_prefix(&self, prefix: &str) -> Result<Vec<Memory>, IndexError> {
        let pattern = format!("{}%", like_escape(prefix));
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{SELECT_MEMORY} WHERE id LIKE ?1 ESCAPE '\\' ORDER BY id"
            ))?;
        let rows = stmt
            .query_map(params![pattern], row_to_memory)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The live memory in `project` whose normalized title matches, if
    /// any. Backs dedup-on-save.
    pub fn find_by_title(
        &self,
        project: &str,
        title: &str,
    ) -> Result<Option<Memory>, IndexError> {
        let memory = self
            .conn
            .prepare(&format!(
                "{SELECT_MEMORY} WHERE project = ?1 AND title_norm = ?2
                 ORDER BY created_at DESC LIMIT 1"
            ))?
            .query_row(params![project, normalize_title(title)], row_to_memory)
            .optional()?;
        Ok(memory)
    }

    /// Most recent memories, newest first, with optional project and
    /// source filters.
    pub fn recent(
        &self,
        project: Option<&str>,
        source: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Memory>, IndexError> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_MEMORY}
             WHERE (?1 IS NULL OR project = ?1) AND (?2 IS NULL OR source = ?2)
             ORDER BY created_at DESC LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(params![project, source, limit as i64], row_to_memory)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Lexical full-text query. Returns `(id, relevance)` with higher
    /// meaning better. A query with no indexable terms returns empty.
    pub fn lexical_search(
        &self,
        query: &str,
        project: Option<&str>,
        source: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, f64)>, IndexError> {
        let match_query = match build_match_query(query) {
            Some(q) => q,
            None => return Ok(Vec::new()),
        };
        let mut stmt = self.conn.prepare(
            "SELECT m.id, -bm25(memories_fts) AS relevance
             FROM memories_fts f
             JOIN memories m ON m.id = f.id
             WHERE memories_fts MATCH ?1
               AND (?2 IS NULL OR m.project = ?2)
               AND (?3 IS NULL OR m.source = ?3)
             ORDER BY relevance DESC
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(params![match_query, project, source, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Brute-force cosine scan over stored embeddings. Returns
    /// `(id, similarity)`, best first.
    pub fn semantic_search(
        &self,
        query_vector: &[f32],
        project: Option<&str>,
        source: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, f64)>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.vector
             FROM embeddings e
             JOIN memories m ON m.id = e.id
             WHERE (?1 IS NULL OR m.project = ?1)
               AND (?2 IS NULL OR m.source = ?2)",
        )?;
        let mut scored = Vec::new();
        let mut rows = stmt.query(params![project, source])?;
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let stored = vector::decode(&blob)?;
            scored.push((id, vector::cosine(query_vector, &stored)));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Creation timestamps for a set of ids, for recency tie-breaks.
    pub fn created_at_map(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, DateTime<Utc>>, IndexError> {
        let mut map = HashMap::new();
        for id in ids {
            if let Some(memory) = self.get(id)? {
                map.insert(id.clone(), memory.created_at);
            }
        }
        Ok(map)
    }

    /// Dimension of the stored embeddings, if any have been written.
    pub fn embedding_dim(&self) -> Result<Option<usize>, IndexError> {
        let value: Option<String> = self
            .conn
            .prepare("SELECT value FROM meta WHERE key = ?1")?
            .query_row(params![META_EMBEDDING_DIM], |row| row.get(0))
            .optional()?;
        match value {
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|_| IndexError::Corrupt(format!("meta {META_EMBEDDING_DIM}={v}"))),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn embedded_count(&self) -> Result<usize, IndexError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

const SELECT_MEMORY: &str = "SELECT id, project, title, what, why, impact, tags, category,
        related_files, source, details, created_at, updated_count
 FROM memories";

fn insert_row(conn: &Connection, memory: &Memory) -> Result<(), IndexError> {
    conn.execute(
        "INSERT OR REPLACE INTO memories
            (id, project, title, title_norm, what, why, impact, tags, category,
             related_files, source, details, created_at, updated_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            memory.id,
            memory.project,
            memory.title,
            normalize_title(&memory.title),
            memory.what,
            memory.why,
            memory.impact,
            serde_json::to_string(&memory.tags)?,
            memory.category.as_str(),
            serde_json::to_string(&memory.related_files)?,
            memory.source,
            memory.details,
            memory.created_at.to_rfc3339(),
            memory.updated_count,
        ],
    )?;
    conn.execute("DELETE FROM memories_fts WHERE id = ?1", params![memory.id])?;
    conn.execute(
        "INSERT INTO memories_fts (id, title, what, why, impact, tags, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            memory.id,
            memory.title,
            memory.what,
            memory.why,
            memory.impact,
            memory.tags.join(" "),
            memory.details.as_deref().unwrap_or(""),
        ],
    )?;
    Ok(())
}

/// Record the vector, fixing the index-wide dimension on first write.
/// A row whose vector disagrees with that dimension is skipped, leaving
/// the row lexical-only until a reindex.
fn store_embedding(conn: &Connection, id: &str, vec: &[f32]) -> Result<(), IndexError> {
    let stored_dim: Option<String> = conn
        .prepare("SELECT value FROM meta WHERE key = ?1")?
        .query_row(params![META_EMBEDDING_DIM], |row| row.get(0))
        .optional()?;
    match stored_dim {
        None => {
            conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
                params![META_EMBEDDING_DIM, vec.len().to_string()],
            )?;
        }
        Some(dim) if dim != vec.len().to_string() => {
            warn!(
                id,
                stored = dim,
                got = vec.len(),
                "embedding dimension mismatch, row stays lexical-only"
            );
            return Ok(());
        }
        Some(_) => {}
    }
    conn.execute(
        "INSERT OR REPLACE INTO embeddings (id, vector) VALUES (?1, ?2)",
        params![id, vector::encode(vec)],
    )?;
    Ok(())
}

fn row_to_memory(row: &Row<'_>) -> rusqlite::Result<Memory> {
    let tags_json: String = row.get(6)?;
    let category_str: String = row.get(7)?;
    let files_json: String = row.get(8)?;
    let created_str: String = row.get(11)?;

    let tags = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let category = Category::from_str(&category_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, e.into()))?;
    let related_files = serde_json::from_str(&files_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    let created_at = DateTime::parse_from_rfc3339(&created_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(Memory {
        id: row.get(0)?,
        project: row.get(1)?,
        title: row.get(2)?,
        what: row.get(3)?,
        why: row.get(4)?,
        impact: row.get(5)?,
        tags,
        category,
        related_files,
        source: row.get(9)?,
        details: row.get(10)?,
        created_at,
        updated_count: row.get(12)?,
    })
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Quote each alphanumeric term so user input cannot hit FTS5 operator
/// syntax; terms are OR-ed for recall.
fn build_match_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use echovault_types::{Category, MemoryDraft};

    fn memory(project: &str, title: &str, what: &str) -> Memory {
        Memory::from_draft(
            MemoryDraft::new(title, what).with_category(Category::Decision),
            project,
        )
    }

    #[test]
    fn test_upsert_then_get_round_trip() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let m = memory("p1", "Switched to JWT auth", "replaced session cookies");
        store.upsert(&m, None).unwrap();
        assert_eq!(store.get(&m.id).unwrap(), Some(m));
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = IndexStore::open_in_memory().unwrap();
        assert_eq!(store.get("01NOPE").unwrap(), None);
    }

    #[test]
    fn test_delete_is_silent_for_missing_id() {
        let mut store = IndexStore::open_in_memory().unwrap();
        store.delete("01NOPE").unwrap();
    }

    #[test]
    fn test_lexical_search_finds_keyword() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let m = memory("p1", "Switched to JWT auth", "bearer tokens everywhere");
        store.upsert(&m, None).unwrap();
        store
            .upsert(&memory("p1", "Fixed migration", "schema drift"), None)
            .unwrap();

        let hits = store.lexical_search("jwt", None, None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, m.id);
    }

    #[test]
    fn test_lexical_search_respects_project_filter() {
        let mut store = IndexStore::open_in_memory().unwrap();
        store
            .upsert(&memory("p1", "auth note", "jwt"), None)
            .unwrap();
        store
            .upsert(&memory("p2", "auth note", "jwt"), None)
            .unwrap();
        let hits = store.lexical_search("jwt", Some("p1"), None, 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_lexical_search_survives_operator_syntax() {
        let store = IndexStore::open_in_memory().unwrap();
        // Would be an FTS5 syntax error if passed through raw
        assert!(store
            .lexical_search("\"unbalanced AND (", None, None, 10)
            .is_ok());
        assert!(store.lexical_search("...", None, None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_semantic_search_ranks_by_cosine() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let close = memory("p1", "close", "w");
        let far = memory("p1", "far", "w");
        store.upsert(&close, Some(&[1.0, 0.0, 0.0])).unwrap();
        store.upsert(&far, Some(&[0.0, 1.0, 0.0])).unwrap();

        let hits = store
            .semantic_search(&[0.9, 0.1, 0.0], None, None, 10)
            .unwrap();
        assert_eq!(hits[0].0, close.id);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn test_embedding_dim_recorded_and_mismatch_skipped() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let a = memory("p1", "a", "w");
        let b = memory("p1", "b", "w");
        store.upsert(&a, Some(&[1.0, 0.0])).unwrap();
        assert_eq!(store.embedding_dim().unwrap(), Some(2));

        // Wrong dimension: row stays lexical-only
        store.upsert(&b, Some(&[1.0, 0.0, 0.0])).unwrap();
        assert_eq!(store.embedded_count().unwrap(), 1);
    }

    #[test]
    fn test_rebuild_replaces_everything() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let old = memory("p1", "old", "stale");
        store.upsert(&old, Some(&[1.0])).unwrap();

        let fresh = memory("p1", "fresh", "current");
        store
            .rebuild(&[(fresh.clone(), Some(vec![0.5, 0.5]))])
            .unwrap();

        assert_eq!(store.get(&old.id).unwrap(), None);
        assert_eq!(store.get(&fresh.id).unwrap(), Some(fresh));
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.embedding_dim().unwrap(), Some(2));
    }

    #[test]
    fn test_rebuild_twice_converges() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let m = memory("p1", "stable", "unchanging");
        let entries = vec![(m.clone(), None)];
        store.rebuild(&entries).unwrap();
        let first = store.lexical_search("stable", None, None, 10).unwrap();
        store.rebuild(&entries).unwrap();
        let second = store.lexical_search("stable", None, None, 10).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_find_by_title_is_case_insensitive() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let m = memory("p1", "Switched to JWT Auth", "w");
        store.upsert(&m, None).unwrap();
        let found = store.find_by_title("p1", "  switched to jwt auth ").unwrap();
        assert_eq!(found.map(|f| f.id), Some(m.id));
    }

    #[test]
    fn test_find_by_id_prefix() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let m = memory("p1", "t", "w");
        store.upsert(&m, None).unwrap();
        let found = store.find_by_id_prefix(&m.id[..4]).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_recent_orders_newest_first() {
        let mut store = IndexStore::open_in_memory().unwrap();
        let mut older = memory("p1", "older", "w");
        older.created_at = older.created_at - chrono::Duration::seconds(60);
        let newer = memory("p1", "newer", "w");
        store.upsert(&older, None).unwrap();
        store.upsert(&newer, None).unwrap();

        let recent = store.recent(Some("p1"), None, 10).unwrap();
        assert_eq!(recent[0].title, "newer");
        assert_eq!(recent[1].title, "older");
    }
}
