//! Search and context result types.

use echovault_types::MemorySummary;

/// Whether the semantic half of hybrid search ran, and if not, why.
/// Degradation is part of the result, never silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticStatus {
    /// Both lexical and semantic sets contributed
    Used,
    /// Semantic search was wanted but could not run this call
    Skipped(String),
    /// Embeddings are off by configuration
    Disabled,
}

impl std::fmt::Display for SemanticStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticStatus::Used => f.write_str("hybrid (lexical + semantic)"),
            SemanticStatus::Skipped(reason) => write!(f, "lexical only ({reason})"),
            SemanticStatus::Disabled => f.write_str("lexical only (embeddings disabled)"),
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub summary: MemorySummary,
    pub score: f64,
}

/// A full search response.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub semantic: SemanticStatus,
}

/// The bounded set of memories surfaced at session start: relevance
/// matches first, then recency fill.
#[derive(Debug, Clone)]
pub struct ContextBlock {
    pub project: String,
    pub pointers: Vec<MemorySummary>,
    pub semantic: SemanticStatus,
}
