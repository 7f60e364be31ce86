//! Embedding backends.

use sha2::{Digest, Sha256};

use super::vector::l2_normalize;
use crate::error::{CairnError, Result};

/// Default dimensionality of [`HashingEmbedder`] vectors.
pub const DEFAULT_HASHING_DIMENSIONS: usize = 256;

/// Turns text into a fixed-length vector.
///
/// Implementations must be deterministic for a given model name: vectors are
/// persisted and compared against later queries.
pub trait Embedder: Send + Sync {
    /// Model identifier stored next to each vector.
    fn model(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Local, dependency-free backend using signed feature hashing.
///
/// Each lowercase alphanumeric token is hashed with SHA-256; the hash picks a
/// bucket and a sign. The resulting vector is L2-normalized, so texts sharing
/// vocabulary score high under cosine similarity.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model: String,
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(CairnError::invalid_input("dimensions")
                .with_reason("Embedding dimensions must be positive"));
        }
        Ok(Self {
            model: format!("hashing-sha256-{dimensions}"),
            dimensions,
        })
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            model: format!("hashing-sha256-{DEFAULT_HASHING_DIMENSIONS}"),
            dimensions: DEFAULT_HASHING_DIMENSIONS,
        }
    }
}

impl Embedder for HashingEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| token.chars().count() >= 2)
            .map(str::to_lowercase);

        for token in tokens {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dimensions;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}
