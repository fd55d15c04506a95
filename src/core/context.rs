//! The 8-dimensional context vector shared by selection and learning.
//!
//! A context vector is captured once at assignment time and stored on the
//! assignment row; learning always reads it back rather than recomputing,
//! so later edits to employee fields cannot skew the bandit update.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TmError};

/// Dimension of the context vector consumed by the bandit.
pub const CONTEXT_DIM: usize = 8;

/// A fixed-size feature vector for one (task, employee) pair.
///
/// Components, all min-max normalized to `[0, 1]`:
/// productivity, idleness, priority, difficulty, skill similarity,
/// urgency, experience, tenure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextVector {
    values: [f64; CONTEXT_DIM],
}

impl ContextVector {
    #[must_use]
    pub fn new(values: [f64; CONTEXT_DIM]) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// L2 norm, used by the cold-start exploration term.
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Encode as little-endian f64 bytes for blob storage.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Decode from a stored blob; the length must be exactly `CONTEXT_DIM` f64s.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CONTEXT_DIM * 8 {
            return Err(TmError::InvariantViolated(format!(
                "context vector blob has {} bytes, expected {}",
                bytes.len(),
                CONTEXT_DIM * 8
            )));
        }
        let mut values = [0.0; CONTEXT_DIM];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            values[i] = f64::from_le_bytes(chunk.try_into().expect("chunk is 8 bytes"));
        }
        Ok(Self { values })
    }
}
