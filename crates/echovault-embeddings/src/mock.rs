//! Deterministic in-process provider for tests.

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::provider::EmbeddingProvider;

pub const MOCK_DIM: usize = 768;

/// Hashes tokens into a fixed 768-dimension bag-of-words vector.
/// Identical text always embeds identically, and overlapping token sets
/// land near each other, which is enough to exercise hybrid ranking.
pub struct MockProvider {
    dim: usize,
    fail: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            dim: MOCK_DIM,
            fail: false,
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dim(dim: usize) -> Self {
        Self { dim, fail: false }
    }

    /// A provider that always errors, for degradation tests.
    pub fn unreachable() -> Self {
        Self {
            dim: MOCK_DIM,
            fail: true,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.fail {
            return Err(EmbeddingError::Http("mock provider is unreachable".into()));
        }
        let mut vector = vec![0.0f32; self.dim];
        for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let bucket = (fnv1a(token.as_bytes()) as usize) % self.dim;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// FNV-1a, so the bucketing is stable across runs and toolchains.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
