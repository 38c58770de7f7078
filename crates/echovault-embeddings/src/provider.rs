//! The embedding capability interface.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Maps text to a fixed-length vector. Implementations are selected by
/// configuration at startup; callers treat any failure as a cue to run
/// lexical-only.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name for logs and degradation messages.
    fn name(&self) -> &str;

    /// Embed one text. The vector length is the provider's fixed
    /// dimension for its model.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
