//! Skill similarity filter.
//!
//! Narrows the candidate pool to the K employees whose skill embeddings
//! best cover the task's required skills. Similarity is the mean over all
//! (task skill, employee skill) pairs of the non-negative cosine, so
//! broad coverage is rewarded over a single best match.
//!
//! The filter never blocks assignment: with no task embeddings, or no
//! candidate embeddings at all, the pool passes through unchanged.

use std::cmp::Ordering;

use crate::core::Employee;

/// One pool member with its similarity to the task.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub employee: Employee,
    pub similarity: f64,
}

/// Preference order shared by the filter and the bandit tie-break:
/// higher productivity, then lower workload, then lexicographic id.
#[must_use]
pub fn prefer(a: &Employee, b: &Employee) -> Ordering {
    b.productivity_score
        .partial_cmp(&a.productivity_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.workload.cmp(&b.workload))
        .then_with(|| a.id.cmp(&b.id))
}

/// Rank the pool by similarity and keep the best `k`.
///
/// With no usable task embeddings, or when no candidate has embeddings,
/// no filtering is possible and the whole pool is returned (similarity 0)
/// in its original order.
#[must_use]
pub fn top_k(task_embeddings: Option<&[Vec<f32>]>, pool: Vec<Employee>, k: usize) -> Vec<Candidate> {
    let task_embs = match task_embeddings {
        Some(embs) if !embs.is_empty() => embs,
        _ => return passthrough(pool),
    };

    if pool.iter().all(|e| e.cached_embeddings().is_none()) {
        return passthrough(pool);
    }

    let mut candidates: Vec<Candidate> = pool
        .into_iter()
        .map(|employee| {
            let similarity = employee
                .cached_embeddings()
                .map_or(0.0, |embs| mean_pairwise(task_embs, embs));
            Candidate {
                employee,
                similarity,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| prefer(&a.employee, &b.employee))
    });

    candidates.truncate(k);
    candidates
}

fn passthrough(pool: Vec<Employee>) -> Vec<Candidate> {
    pool.into_iter()
        .map(|employee| Candidate {
            employee,
            similarity: 0.0,
        })
        .collect()
}

/// Mean over all embedding pairs of `max(0, dot)`.
///
/// Inputs are unit vectors, so the dot product is the cosine.
#[must_use]
pub fn mean_pairwise(task_embs: &[Vec<f32>], employee_embs: &[Vec<f32>]) -> f64 {
    if task_embs.is_empty() || employee_embs.is_empty() {
        return 0.0;
    }

    let mut total = 0.0f64;
    for t in task_embs {
        for e in employee_embs {
            let dot: f32 = t.iter().zip(e.iter()).map(|(a, b)| a * b).sum();
            total += f64::from(dot.max(0.0));
        }
    }
    total / (task_embs.len() * employee_embs.len()) as f64
}
