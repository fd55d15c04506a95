//! Skill embeddings: pluggable provider plus cache-key hashing.
//!
//! Every provider returns unit-norm vectors of a fixed dimension, one per
//! input skill name. The deterministic hash backend needs no model or
//! network; the api backend calls a remote embedding model with a bounded
//! timeout.

mod api;
mod hash;

use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::core::normalize_skill;
use crate::error::{Result, TmError};

pub use api::ApiEmbedder;
pub use hash::HashEmbedder;

/// Pluggable embedding backend interface.
///
/// Implementations MUST return one L2-normalized vector of `dims()`
/// length per input, in input order.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dims(&self) -> usize;
    fn backend(&self) -> &str;
}

/// Build an embedder from config.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let backend = config.backend.trim().to_lowercase();
    if config.dims == 0 {
        return Err(TmError::Config(
            "embedding.dims must be greater than 0".to_string(),
        ));
    }

    match backend.as_str() {
        "" | "hash" => Ok(Box::new(HashEmbedder::new(config.dims))),
        "api" => Ok(Box::new(ApiEmbedder::from_config(config)?)),
        other => Err(TmError::Config(format!(
            "unknown embedding backend: {other}"
        ))),
    }
}

/// Scale a vector to unit L2 norm in place; zero vectors are left as-is.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}

/// Cache key for a stored embedding list.
///
/// Embeddings are regenerated only when the normalized skill list, the
/// backend, or the dimension changes.
#[must_use]
pub fn skills_hash(skill_names: &[String], backend: &str, dims: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(backend.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(dims.to_le_bytes());
    for name in skill_names {
        hasher.update(b"\x1f");
        hasher.update(normalize_skill(name).as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
