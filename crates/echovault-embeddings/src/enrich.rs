//! Optional save-time enrichment: derive extra tags from memory text.
//!
//! Best-effort by contract. A failing enricher is logged and ignored by
//! the caller; the save proceeds without extra tags.

use std::collections::HashMap;

use async_trait::async_trait;

use echovault_types::{EnrichmentSettings, ProviderKind};

use crate::error::EmbeddingError;

const MAX_DERIVED_TAGS: usize = 5;
const MIN_TOKEN_LEN: usize = 4;

const STOPWORDS: &[&str] = &[
    "the", "and", "that", "this", "with", "from", "have", "would", "there", "could", "should",
    "about", "after", "before", "while", "since", "where", "which", "into", "using", "also",
    "because", "these", "those", "been", "being", "were", "does", "done", "make", "made", "when",
    "then", "than", "your", "their", "them", "they", "what", "ever", "over", "just", "more",
    "only", "each", "such", "very", "much", "like", "onto", "upon", "will", "between",
];

/// Derives extra tags for a memory from its own text.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(
        &self,
        text: &str,
        existing_tags: &[String],
    ) -> Result<Vec<String>, EmbeddingError>;
}

/// Frequency-based keyword extraction, no network.
#[derive(Default)]
pub struct KeywordEnricher;

#[async_trait]
impl Enricher for KeywordEnricher {
    async fn enrich(
        &self,
        text: &str,
        existing_tags: &[String],
    ) -> Result<Vec<String>, EmbeddingError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if token.len() < MIN_TOKEN_LEN
                || token.chars().all(|c| c.is_ascii_digit())
                || STOPWORDS.contains(&token)
            {
                continue;
            }
            *counts.entry(token.to_string()).or_default() += 1;
        }
        let existing: Vec<String> = existing_tags.iter().map(|t| t.to_lowercase()).collect();
        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .filter(|(token, _)| !existing.contains(token))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked
            .into_iter()
            .take(MAX_DERIVED_TAGS)
            .map(|(token, _)| token)
            .collect())
    }
}

/// Build the configured enricher, or `None` when enrichment is off.
pub fn enricher_from_settings(settings: &EnrichmentSettings) -> Option<Box<dyn Enricher>> {
    match settings.provider {
        ProviderKind::None => None,
        _ => Some(Box::new(KeywordEnricher)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extracts_frequent_keywords() {
        let enricher = KeywordEnricher;
        let tags = enricher
            .enrich(
                "migration scripts broke because migration ordering assumed postgres",
                &[],
            )
            .await
            .unwrap();
        assert_eq!(tags.first().map(String::as_str), Some("migration"));
        assert!(tags.len() <= MAX_DERIVED_TAGS);
    }

    #[tokio::test]
    async fn test_skips_existing_tags_and_stopwords() {
        let enricher = KeywordEnricher;
        let tags = enricher
            .enrich(
                "because there should would migration postgres",
                &["Migration".to_string()],
            )
            .await
            .unwrap();
        assert!(!tags.contains(&"migration".to_string()));
        assert!(!tags.contains(&"because".to_string()));
        assert!(tags.contains(&"postgres".to_string()));
    }

    #[test]
    fn test_factory_respects_none() {
        let mut settings = EnrichmentSettings::default();
        assert!(enricher_from_settings(&settings).is_none());
        settings.provider = ProviderKind::Ollama;
        assert!(enricher_from_settings(&settings).is_some());
    }
}
