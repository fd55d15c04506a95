//! Disjoint LinUCB over employee arms.
//!
//! Each arm keeps a ridge design matrix `A = lambda*I + sum(x x^T)` and a
//! response vector `b = sum(r x)`. Selection scores a context `x` as
//! `theta^T x + alpha * sqrt(x^T A^-1 x)` with `theta = A^-1 b`.
//!
//! `A` is symmetric positive definite by construction, so every solve goes
//! through a Cholesky factorization; if the factorization fails on a
//! degenerate stored matrix, the arm scores as cold-start for that decision
//! and the failure is logged, not surfaced.

use tracing::warn;

use crate::core::{ContextVector, CONTEXT_DIM};
use crate::error::{Result, TmError};

/// Per-arm LinUCB state.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmState {
    /// Row-major `CONTEXT_DIM x CONTEXT_DIM` design matrix.
    a: Vec<f64>,
    /// Response vector.
    b: Vec<f64>,
    update_count: u64,
}

/// Score breakdown for one arm under one context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmScore {
    /// `predicted + exploration`; the selection key.
    pub ucb: f64,
    pub predicted: f64,
    pub exploration: f64,
    /// True when the score came from the cold-start fallback path.
    pub degraded: bool,
}

impl ArmState {
    /// Fresh arm: `A = lambda*I`, `b = 0`.
    #[must_use]
    pub fn cold(lambda: f64) -> Self {
        let d = CONTEXT_DIM;
        let mut a = vec![0.0; d * d];
        for i in 0..d {
            a[i * d + i] = lambda;
        }
        Self {
            a,
            b: vec![0.0; d],
            update_count: 0,
        }
    }

    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Apply one observed reward: `A += x x^T`, `b += r * x`.
    pub fn observe(&mut self, x: &ContextVector, reward: f64) {
        let d = CONTEXT_DIM;
        let xs = x.as_slice();
        for i in 0..d {
            for j in 0..d {
                self.a[i * d + j] += xs[i] * xs[j];
            }
        }
        for (b_i, x_i) in self.b.iter_mut().zip(xs.iter()) {
            *b_i += reward * x_i;
        }
        self.update_count += 1;
    }

    /// UCB score for a context.
    ///
    /// `lambda` is only consulted on the degraded path, where the
    /// exploration term reduces to `alpha * ||x|| / sqrt(lambda)`.
    #[must_use]
    pub fn score(&self, x: &ContextVector, alpha: f64, lambda: f64) -> ArmScore {
        let d = CONTEXT_DIM;
        let xs = x.as_slice();

        if let Some(factor) = cholesky(&self.a, d) {
            let theta = cholesky_solve(&factor, &self.b, d);
            let a_inv_x = cholesky_solve(&factor, xs, d);

            let predicted: f64 = xs.iter().zip(theta.iter()).map(|(x, t)| x * t).sum();
            let variance: f64 = xs
                .iter()
                .zip(a_inv_x.iter())
                .map(|(x, ax)| x * ax)
                .sum::<f64>()
                .max(0.0);
            let exploration = alpha * variance.sqrt();

            ArmScore {
                ucb: predicted + exploration,
                predicted,
                exploration,
                degraded: false,
            }
        } else {
            warn!(
                updates = self.update_count,
                "cholesky factorization failed; scoring arm as cold-start"
            );
            let exploration = alpha * x.norm() / lambda.sqrt();
            ArmScore {
                ucb: exploration,
                predicted: 0.0,
                exploration,
                degraded: true,
            }
        }
    }

    /// Serialize as (A, b) little-endian f64 blobs.
    #[must_use]
    pub fn to_blobs(&self) -> (Vec<u8>, Vec<u8>) {
        let a = self.a.iter().flat_map(|v| v.to_le_bytes()).collect();
        let b = self.b.iter().flat_map(|v| v.to_le_bytes()).collect();
        (a, b)
    }

    /// Restore from stored blobs; lengths must match `CONTEXT_DIM`.
    pub fn from_blobs(a_blob: &[u8], b_blob: &[u8], update_count: u64) -> Result<Self> {
        let d = CONTEXT_DIM;
        if a_blob.len() != d * d * 8 || b_blob.len() != d * 8 {
            return Err(TmError::InvariantViolated(format!(
                "bandit blob size mismatch: A has {} bytes, b has {} bytes",
                a_blob.len(),
                b_blob.len()
            )));
        }
        let a = decode_f64s(a_blob);
        let b = decode_f64s(b_blob);
        Ok(Self { a, b, update_count })
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> (&[f64], &[f64]) {
        (&self.a, &self.b)
    }
}

fn decode_f64s(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().expect("chunk is 8 bytes")))
        .collect()
}

/// Cholesky factorization of a row-major SPD matrix; returns the lower
/// factor L with `A = L L^T`, or None if a pivot is non-positive.
fn cholesky(a: &[f64], d: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; d * d];
    for i in 0..d {
        for j in 0..=i {
            let mut sum = a[i * d + j];
            for k in 0..j {
                sum -= l[i * d + k] * l[j * d + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i * d + i] = sum.sqrt();
            } else {
                l[i * d + j] = sum / l[j * d + j];
            }
        }
    }
    Some(l)
}

/// Solve `A z = rhs` given the lower Cholesky factor of A.
fn cholesky_solve(l: &[f64], rhs: &[f64], d: usize) -> Vec<f64> {
    // Forward: L y = rhs
    let mut y = vec![0.0; d];
    for i in 0..d {
        let mut sum = rhs[i];
        for k in 0..i {
            sum -= l[i * d + k] * y[k];
        }
        y[i] = sum / l[i * d + i];
    }
    // Backward: L^T z = y
    let mut z = vec![0.0; d];
    for i in (0..d).rev() {
        let mut sum = y[i];
        for k in (i + 1)..d {
            sum -= l[k * d + i] * z[k];
        }
        z[i] = sum / l[i * d + i];
    }
    z
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(values: [f64; CONTEXT_DIM]) -> ContextVector {
        ContextVector::new(values)
    }

    fn axis(i: usize) -> ContextVector {
        let mut values = [0.0; CONTEXT_DIM];
        values[i] = 1.0;
        ctx(values)
    }

    #[test]
    fn cold_arm_scores_pure_exploration() {
        let arm = ArmState::cold(1.0);
        let x = axis(0);
        let score = arm.score(&x, 1.0, 1.0);

        assert!(!score.degraded);
        assert!(score.predicted.abs() < 1e-12);
        // alpha * sqrt(x^T (lambda I)^-1 x) = ||x|| = 1
        assert!((score.exploration - 1.0).abs() < 1e-12);
        assert!((score.ucb - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cold_start_scales_with_lambda() {
        let arm = ArmState::cold(4.0);
        let score = arm.score(&axis(0), 1.0, 4.0);
        // ||x|| / sqrt(lambda) = 0.5
        assert!((score.exploration - 0.5).abs() < 1e-12);
    }

    #[test]
    fn observe_moves_prediction_toward_reward() {
        let mut arm = ArmState::cold(1.0);
        let x = axis(2);

        for _ in 0..50 {
            arm.observe(&x, 1.7);
        }

        let score = arm.score(&x, 1.0, 1.0);
        // theta converges to reward/(1 + lambda/n) along x.
        assert!((score.predicted - 1.7).abs() < 0.1);
        // Exploration shrinks with observations.
        assert!(score.exploration < 0.2);
        assert_eq!(arm.update_count(), 50);
    }

    #[test]
    fn trained_arm_beats_cold_arm_on_its_context() {
        let mut good = ArmState::cold(1.0);
        let bad = ArmState::cold(1.0);
        let x = ctx([0.9, 1.0, 0.5, 0.2, 0.8, 0.0, 0.3, 0.3]);

        for _ in 0..20 {
            good.observe(&x, 1.5);
        }

        let good_score = good.score(&x, 1.0, 1.0);
        let bad_score = bad.score(&x, 1.0, 1.0);
        assert!(good_score.ucb > bad_score.ucb);
    }

    #[test]
    fn negative_reward_pushes_score_down() {
        let mut arm = ArmState::cold(1.0);
        let x = axis(1);
        for _ in 0..30 {
            arm.observe(&x, -1.2);
        }
        let score = arm.score(&x, 1.0, 1.0);
        assert!(score.predicted < -1.0);
        assert!(score.ucb < 0.0);
    }

    #[test]
    fn updates_commute() {
        let x1 = ctx([1.0, 0.2, 0.0, 0.5, 0.0, 0.0, 0.1, 0.9]);
        let x2 = ctx([0.0, 1.0, 0.3, 0.0, 0.7, 0.0, 0.0, 0.2]);
        let x3 = ctx([0.4, 0.4, 0.4, 0.4, 0.4, 0.4, 0.4, 0.4]);

        let mut forward = ArmState::cold(1.0);
        forward.observe(&x1, 1.7);
        forward.observe(&x2, -0.2);
        forward.observe(&x3, 0.5);

        let mut backward = ArmState::cold(1.0);
        backward.observe(&x3, 0.5);
        backward.observe(&x2, -0.2);
        backward.observe(&x1, 1.7);

        let (fa, fb) = forward.raw();
        let (ba, bb) = backward.raw();
        for (l, r) in fa.iter().zip(ba.iter()) {
            assert!((l - r).abs() < 1e-9);
        }
        for (l, r) in fb.iter().zip(bb.iter()) {
            assert!((l - r).abs() < 1e-9);
        }
    }

    #[test]
    fn accumulators_match_closed_form() {
        let x = ctx([0.5, 0.0, 1.0, 0.0, 0.25, 0.0, 0.0, 0.0]);
        let mut arm = ArmState::cold(2.0);
        arm.observe(&x, 1.0);

        let (a, b) = arm.raw();
        let xs = x.as_slice();
        for i in 0..CONTEXT_DIM {
            for j in 0..CONTEXT_DIM {
                let lambda_term = if i == j { 2.0 } else { 0.0 };
                let expected = lambda_term + xs[i] * xs[j];
                assert!((a[i * CONTEXT_DIM + j] - expected).abs() < 1e-12);
            }
            assert!((b[i] - xs[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn blob_roundtrip_preserves_state() {
        let mut arm = ArmState::cold(1.0);
        arm.observe(&ctx([0.9, 0.1, 0.5, 0.3, 0.31, 0.0, 0.4, 0.25]), 1.7);

        let (a_blob, b_blob) = arm.to_blobs();
        let restored = ArmState::from_blobs(&a_blob, &b_blob, arm.update_count()).unwrap();
        assert_eq!(arm, restored);
    }

    #[test]
    fn bad_blob_lengths_rejected() {
        assert!(ArmState::from_blobs(&[0u8; 3], &[0u8; 64], 0).is_err());
        assert!(ArmState::from_blobs(&[0u8; 512], &[0u8; 3], 0).is_err());
    }

    #[test]
    fn degenerate_matrix_degrades_to_cold_start() {
        // An all-zero A cannot come from normal operation; a corrupt row
        // must degrade the decision, not kill it.
        let arm = ArmState::from_blobs(&[0u8; CONTEXT_DIM * CONTEXT_DIM * 8], &[0u8; CONTEXT_DIM * 8], 7)
            .unwrap();
        let score = arm.score(&axis(0), 1.0, 1.0);
        assert!(score.degraded);
        assert!((score.ucb - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cholesky_of_identity_is_identity() {
        let d = 3;
        let a = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let l = cholesky(&a, d).unwrap();
        for i in 0..d {
            for j in 0..d {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((l[i * d + j] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn cholesky_solve_recovers_known_solution() {
        // A = [[4, 2], [2, 3]], z = [1, 2] => rhs = A z = [8, 8]
        let a = vec![4.0, 2.0, 2.0, 3.0];
        let l = cholesky(&a, 2).unwrap();
        let z = cholesky_solve(&l, &[8.0, 8.0], 2);
        assert!((z[0] - 1.0).abs() < 1e-12);
        assert!((z[1] - 2.0).abs() < 1e-12);
    }
}
