//! # echovault-embeddings
//!
//! Embedding and enrichment capabilities behind small async traits,
//! selected by configuration at startup.
//!
//! Providers are thin HTTP adapters (Ollama's embeddings API, any
//! OpenAI-compatible endpoint) plus a deterministic mock for tests.
//! Every provider failure is a [`EmbeddingError`]; callers are expected
//! to degrade to lexical-only search rather than fail.

pub mod enrich;
pub mod error;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use enrich::{enricher_from_settings, Enricher, KeywordEnricher};
pub use error::EmbeddingError;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatProvider;
pub use provider::EmbeddingProvider;

use echovault_types::{EmbeddingSettings, ProviderKind};

/// Build the configured embedding provider, or `None` when embeddings
/// are off.
pub fn provider_from_settings(
    settings: &EmbeddingSettings,
) -> Result<Option<Box<dyn EmbeddingProvider>>, EmbeddingError> {
    let provider: Box<dyn EmbeddingProvider> = match settings.provider {
        ProviderKind::None => return Ok(None),
        ProviderKind::Ollama => Box::new(OllamaProvider::new(
            settings.base_url.clone(),
            settings.model.clone(),
        )?),
        ProviderKind::Openai => Box::new(OpenAiCompatProvider::openai(settings)?),
        ProviderKind::Voyage => Box::new(OpenAiCompatProvider::voyage(settings)?),
    };
    Ok(Some(provider))
}
