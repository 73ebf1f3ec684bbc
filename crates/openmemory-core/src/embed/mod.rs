//! Embedding Port
//!
//! The core treats embedding as an external concern: anything implementing
//! [`Embedder`] can back the engine. The bundled [`HashEmbedder`] is a
//! deterministic token feature-hashing projection; it keeps the engine pure
//! and testable without pulling an inference runtime into the crate.

mod hash;

pub use hash::HashEmbedder;

// ============================================================================
// ERROR
// ============================================================================

/// Embedding failure; surfaces to callers as `EmbedderUnavailable`
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedder unavailable: {0}")]
    Unavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// PORT
// ============================================================================

/// Content-to-vector adapter
///
/// Implementations must be deterministic from the core's viewpoint and
/// return exactly `dimensions()` values. The core never fabricates
/// embeddings on failure.
pub trait Embedder: Send + Sync {
    /// Embed a piece of text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Vector dimensionality this embedder produces
    fn dimensions(&self) -> usize;
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Cosine similarity between two vectors; 0.0 on dimension mismatch
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Serialize a vector to little-endian bytes for blob storage
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize a blob back into a vector; `None` when the length is off
pub fn vector_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identity() {
        let v = vec![0.5, 0.5, 0.0, 0.7];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_vector_bytes_roundtrip() {
        let v = vec![0.25f32, -1.5, 3.75];
        let bytes = vector_to_bytes(&v);
        assert_eq!(vector_from_bytes(&bytes), Some(v));
        assert_eq!(vector_from_bytes(&bytes[..5]), None);
    }
}
