//! Memory record types.
//!
//! A `Memory` is the atomic unit of knowledge: a short structured note
//! (decision, bug, pattern, context, learning) tied to a project. Records
//! are immutable once written to the vault; an update appends a fresh
//! entry under the same id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Fixed category enumeration. Saving with anything else fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Decision,
    Pattern,
    Bug,
    Context,
    Learning,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Decision => "decision",
            Category::Pattern => "pattern",
            Category::Bug => "bug",
            Category::Context => "context",
            Category::Learning => "learning",
        }
    }

    /// All valid category names, for error messages.
    pub const ALL: [&'static str; 5] = ["decision", "pattern", "bug", "context", "learning"];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(Category::Decision),
            "pattern" => Ok(Category::Pattern),
            "bug" => Ok(Category::Bug),
            "context" => Ok(Category::Context),
            "learning" => Ok(Category::Learning),
            other => Err(format!(
                "invalid category '{}' (expected one of: {})",
                other,
                Category::ALL.join(", ")
            )),
        }
    }
}

/// A persisted memory record.
///
/// Every free-text field has passed redaction before a `Memory` is
/// constructed for persistence. `id` and `created_at` never change; a
/// dedup update bumps `updated_count` and replaces the content fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier (ULID string), stable for the memory's lifetime
    pub id: String,

    /// Owning project key (vault subdirectory and index filter)
    pub project: String,

    /// One-line headline
    pub title: String,

    /// What happened / what was done
    pub what: String,

    /// Why it was done
    #[serde(default)]
    pub why: String,

    /// Observable impact
    #[serde(default)]
    pub impact: String,

    /// Free-form tag set
    #[serde(default)]
    pub tags: Vec<String>,

    /// Fixed-enumeration category
    pub category: Category,

    /// Paths touched by this memory, in the order supplied
    #[serde(default)]
    pub related_files: Vec<String>,

    /// Agent or tool that produced the memory (e.g. "cli", "claude-code")
    #[serde(default = "default_source")]
    pub source: String,

    /// Optional long-form body, fetched only via `details`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Creation time, immutable
    pub created_at: DateTime<Utc>,

    /// Number of dedup updates folded into this record
    #[serde(default)]
    pub updated_count: u32,
}

fn default_source() -> String {
    "cli".to_string()
}

impl Memory {
    /// Mint a new record from a draft. Generates the id and timestamp.
    pub fn from_draft(draft: MemoryDraft, project: &str) -> Self {
        Self {
            id: Ulid::new().to_string(),
            project: project.to_string(),
            title: draft.title,
            what: draft.what,
            why: draft.why,
            impact: draft.impact,
            tags: draft.tags,
            category: draft.category,
            related_files: draft.related_files,
            source: draft.source,
            details: draft.details,
            created_at: Utc::now(),
            updated_count: 0,
        }
    }

    /// Concatenated searchable text (title + what + why + impact + tags +
    /// details), used for both full-text indexing and embedding input.
    pub fn search_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.what.as_str()];
        if !self.why.is_empty() {
            parts.push(&self.why);
        }
        if !self.impact.is_empty() {
            parts.push(&self.impact);
        }
        let tags = self.tags.join(" ");
        if !tags.is_empty() {
            parts.push(&tags);
        }
        if let Some(details) = &self.details {
            parts.push(details);
        }
        parts.join("\n")
    }

    /// Serialize to the canonical JSON payload stored in the vault.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from the canonical JSON payload.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Compact summary for search and context listings.
    pub fn summary(&self) -> MemorySummary {
        MemorySummary {
            id: self.id.clone(),
            project: self.project.clone(),
            title: self.title.clone(),
            excerpt: excerpt(&self.what, 160),
            category: self.category,
            tags: self.tags.clone(),
            source: self.source.clone(),
            created_at: self.created_at,
            has_details: self.details.is_some(),
        }
    }
}

/// Truncate to `max` characters on a char boundary, appending an ellipsis.
fn excerpt(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}

/// Raw save input, before redaction and id assignment.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraft {
    pub title: String,
    pub what: String,
    pub why: String,
    pub impact: String,
    pub tags: Vec<String>,
    pub category: Category,
    pub related_files: Vec<String>,
    pub source: String,
    pub details: Option<String>,
}

impl Default for Category {
    fn default() -> Self {
        Category::Context
    }
}

impl MemoryDraft {
    pub fn new(title: impl Into<String>, what: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            what: what.into(),
            source: default_source(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Bounded-size listing row returned by search and context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub id: String,
    pub project: String,
    pub title: String,
    /// Excerpt of `what`, never the details body
    pub excerpt: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub has_details: bool,
}

/// Whether a save created a new memory or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Created,
    Updated,
}

impl std::fmt::Display for SaveAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveAction::Created => f.write_str("created"),
            SaveAction::Updated => f.write_str("updated"),
        }
    }
}

/// Outcome of a save: id, vault location, and non-fatal guidance.
#[derive(Debug, Clone)]
pub struct SaveReceipt {
    pub id: String,
    pub title: String,
    pub action: SaveAction,
    pub file_path: std::path::PathBuf,
    /// Quality warnings (e.g. a decision saved without details)
    pub warnings: Vec<String>,
    /// Set when the index upsert failed after a successful vault append;
    /// the save succeeded but `reindex` is needed to resynchronize.
    pub index_warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_json_roundtrip() {
        let draft = MemoryDraft::new("Switched to JWT auth", "Replaced session cookies")
            .with_category(Category::Decision)
            .with_tags(vec!["auth".into(), "jwt".into()])
            .with_details("Context:\nTokens drifted between clients.");
        let memory = Memory::from_draft(draft, "api-server");

        let json = memory.to_json().unwrap();
        let decoded = Memory::from_json(&json).unwrap();

        assert_eq!(memory, decoded);
    }

    #[test]
    fn test_roundtrip_preserves_absent_details() {
        let memory = Memory::from_draft(MemoryDraft::new("No details", "Short note"), "p1");
        let json = memory.to_json().unwrap();
        assert!(!json.contains("details"));
        let decoded = Memory::from_json(&json).unwrap();
        assert_eq!(decoded.details, None);
        assert_eq!(memory, decoded);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("decision".parse::<Category>().unwrap(), Category::Decision);
        assert_eq!("learning".parse::<Category>().unwrap(), Category::Learning);
        let err = "invalid-category".parse::<Category>().unwrap_err();
        assert!(err.contains("decision"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Memory::from_draft(MemoryDraft::new("a", "a"), "p");
        let b = Memory::from_draft(MemoryDraft::new("b", "b"), "p");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_excerpt_bounds_summary() {
        let long = "x".repeat(500);
        let memory = Memory::from_draft(MemoryDraft::new("t", long), "p");
        let summary = memory.summary();
        assert!(summary.excerpt.chars().count() <= 161);
        assert!(summary.excerpt.ends_with('…'));
    }

    #[test]
    fn test_search_text_skips_empty_fields() {
        let memory = Memory::from_draft(MemoryDraft::new("Title", "What"), "p");
        let text = memory.search_text();
        assert_eq!(text, "Title\nWhat");
    }
}
