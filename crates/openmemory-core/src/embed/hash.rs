//! Deterministic feature-hashing embedder
//!
//! Tokenizes on alphanumeric runs, hashes unigrams and bigrams into a
//! fixed-dimension bucket space with a signed projection, and unit-normalises
//! the result. Not a semantic model: it gives stable, pure vectors where
//! token overlap drives similarity, which is what the engine's tests and
//! self-hosted deployments without an inference sidecar need.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::{EmbedError, Embedder};

/// Feature-hashing embedder with signed buckets
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    /// Create an embedder producing `dim`-dimensional vectors
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    fn bucket(&self, token: &str, salt: u64) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        salt.hash(&mut hasher);
        token.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        // Sign bit keeps hash collisions from always reinforcing
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EmbedError::InvalidInput("empty content".to_string()));
        }

        let tokens: Vec<String> = trimmed
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect();

        if tokens.is_empty() {
            return Err(EmbedError::InvalidInput(
                "no tokenizable content".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dim];
        for token in &tokens {
            let (idx, sign) = self.bucket(token, 0x516d);
            vector[idx] += sign;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            let (idx, sign) = self.bucket(&bigram, 0xb1a5);
            vector[idx] += sign * 0.5;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}

// ============================================================================
// TESTS
// ============================================================================
