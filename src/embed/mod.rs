//! Embedding provider capability and a deterministic offline default.

use sha2::Digest;
use sha2::Sha256;

use crate::error::CodeloomError;
use crate::error::Result;

/// A source of text embeddings, injected into the orchestrator rather than
/// subclassed. `embed_many` must return vectors in the same order and of
/// the same length as `texts`.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn model_name(&self) -> &str;
    fn dimension(&self) -> usize;
}

/// Deterministic, dependency-free embedding provider: hashes overlapping
/// character shingles of the input into a fixed-width bag-of-features
/// vector, then L2-normalizes it. Used for tests and as the offline
/// default when no real embedding backend is configured.
pub struct HashingEmbeddingProvider {
    dimension: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        let normalized = text.to_lowercase();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        for token in &tokens {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = (u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize) % self.dimension;
            let sign = if digest[4] % 2 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hashing-v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Validate that an embedder's output batch matches the request shape,
/// surfacing a descriptive error rather than panicking on index-out-of-range.
pub fn validate_embedding_batch(requested: usize, produced: &[Vec<f32>], dimension: usize) -> Result<()> {
    if produced.len() != requested {
        return Err(CodeloomError::EmbeddingFailed {
            cause: format!("embedder returned {} vectors for {requested} inputs", produced.len()),
        });
    }
    for vector in produced {
        if vector.len() != dimension {
            return Err(CodeloomError::EmbeddingDimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_provider_is_deterministic() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed_many(&["fn foo() {}".to_string()]).await.unwrap();
        let b = provider.embed_many(&["fn foo() {}".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 64);
    }

    #[tokio::test]
    async fn hashing_provider_distinguishes_different_text() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed_many(&["fn foo() {}".to_string()]).await.unwrap();
        let b = provider.embed_many(&["struct Bar;".to_string()]).await.unwrap();
        assert_ne!(a[0], b[0]);
    }

    #[tokio::test]
    async fn empty_input_returns_empty_output() {
        let provider = HashingEmbeddingProvider::default();
        let out = provider.embed_many(&[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn validate_embedding_batch_detects_count_mismatch() {
        let result = validate_embedding_batch(2, &[vec![0.0; 4]], 4);
        assert!(result.is_err());
    }

    #[test]
    fn validate_embedding_batch_detects_dimension_mismatch() {
        let result = validate_embedding_batch(1, &[vec![0.0; 3]], 4);
        assert!(result.is_err());
    }
}
