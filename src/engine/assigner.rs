//! Assignment coordinator: the selection pipeline and its commit.
//!
//! Auto mode narrows active employees through the similarity filter,
//! scores the survivors with LinUCB, and commits the winner atomically.
//! Manual mode validates the target and commits directly; the bandit is
//! not consulted but the context vector is still captured for learning.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{Assignment, ContextVector, Employee, Task};
use crate::error::{Result, TmError};
use crate::storage::{self, sqlite};

use super::bandit::{ArmScore, ArmState};
use super::{features, similarity, Engine};

/// How the assignee is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignMode {
    /// Similarity filter + bandit pick the assignee.
    Auto,
    /// An administrator names the assignee.
    Manual,
}

/// One row of a non-mutating selection preview.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub employee_id: String,
    pub name: String,
    /// UCB selection score.
    pub score: f64,
    pub predicted: f64,
    pub exploration: f64,
    pub similarity: f64,
    pub context: ContextVector,
}

/// A filtered candidate with its context and bandit score.
struct ScoredCandidate {
    employee: Employee,
    similarity: f64,
    context: ContextVector,
    score: ArmScore,
}

impl Engine {
    /// Assign a task to one employee.
    ///
    /// Preconditions: the task exists, is not done, and has no open
    /// assignment. Manual mode additionally requires an existing, active
    /// target employee. Embedding-provider trouble never fails an
    /// assignment; affected candidates score similarity 0.
    pub fn assign_task(
        &mut self,
        task_id: &str,
        mode: AssignMode,
        manual_employee_id: Option<&str>,
        assigner_id: &str,
    ) -> Result<Assignment> {
        let mut task = self.require_task(task_id)?;
        if task.is_done() {
            return Err(TmError::AlreadyCompleted(task_id.to_string()));
        }
        if self.database().get_open_assignment(task_id)?.is_some() {
            return Err(TmError::AlreadyAssigned(task_id.to_string()));
        }

        match mode {
            AssignMode::Manual => {
                let target = manual_employee_id.ok_or_else(|| {
                    TmError::InvalidManualTarget("manual mode requires an employee id".to_string())
                })?;
                let mut employee = self
                    .database()
                    .get_employee(target)?
                    .ok_or_else(|| TmError::UnknownEmployee(target.to_string()))?;
                if !employee.active {
                    return Err(TmError::InvalidManualTarget(target.to_string()));
                }

                self.ensure_task_cache(&mut task);
                self.ensure_employee_cache(&mut employee);
                let similarity = match (task.cached_embeddings(), employee.cached_embeddings()) {
                    (Some(t), Some(e)) => similarity::mean_pairwise(t, e),
                    _ => 0.0,
                };

                let context =
                    features::extract(&task, &employee, similarity, self.now(), self.config());
                self.commit_assignment(&task.id, employee, context, assigner_id)
            }
            AssignMode::Auto => {
                let k = self.config().top_k;
                let mut scored = self.score_candidates(&mut task, k)?;
                let winner = scored.swap_remove(0);
                debug!(
                    task = %task.id,
                    winner = %winner.employee.id,
                    ucb = winner.score.ucb,
                    similarity = winner.similarity,
                    "bandit selected assignee"
                );
                self.commit_assignment(&task.id, winner.employee, winner.context, assigner_id)
            }
        }
    }

    /// Non-mutating selection preview: the candidates assignment would
    /// consider, in the order it would prefer them.
    pub fn recommend(&self, task_id: &str, k: Option<usize>) -> Result<Vec<Recommendation>> {
        let mut task = self.require_task(task_id)?;
        let k = k.unwrap_or(self.config().top_k);
        let scored = self.score_candidates(&mut task, k)?;

        Ok(scored
            .into_iter()
            .map(|c| Recommendation {
                employee_id: c.employee.id,
                name: c.employee.name,
                score: c.score.ucb,
                predicted: c.score.predicted,
                exploration: c.score.exploration,
                similarity: c.similarity,
                context: c.context,
            })
            .collect())
    }

    /// Filter, featurize, and score candidates; best first, never empty.
    fn score_candidates(&self, task: &mut Task, k: usize) -> Result<Vec<ScoredCandidate>> {
        let pool = self.database().list_employees(true)?;
        if pool.is_empty() {
            return Err(TmError::NoCandidates);
        }

        self.ensure_task_cache(task);
        let task_has_embeddings = task.cached_embeddings().is_some();

        let pool: Vec<Employee> = pool
            .into_iter()
            .map(|mut employee| {
                if task_has_embeddings {
                    self.ensure_employee_cache(&mut employee);
                }
                employee
            })
            .collect();

        let candidates = similarity::top_k(task.cached_embeddings(), pool, k);
        let now = self.now();

        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let arm = self
                .database()
                .get_arm(&candidate.employee.id)?
                .unwrap_or_else(|| ArmState::cold(self.config().lambda));
            let context = features::extract(
                task,
                &candidate.employee,
                candidate.similarity,
                now,
                self.config(),
            );
            let score = arm.score(&context, self.config().alpha, self.config().lambda);
            scored.push(ScoredCandidate {
                employee: candidate.employee,
                similarity: candidate.similarity,
                context,
                score,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .ucb
                .partial_cmp(&a.score.ucb)
                .unwrap_or(Ordering::Equal)
                .then_with(|| similarity::prefer(&a.employee, &b.employee))
        });

        if scored.is_empty() {
            return Err(TmError::NoCandidates);
        }
        Ok(scored)
    }

    /// Write the assignment, point the task at its assignee, and bump the
    /// winner's workload, atomically with respect to concurrent flows on
    /// the same task.
    fn commit_assignment(
        &mut self,
        task_id: &str,
        employee: Employee,
        context: ContextVector,
        assigner_id: &str,
    ) -> Result<Assignment> {
        let now = self.now();
        let assignment = Assignment::open(
            Uuid::new_v4().to_string(),
            task_id,
            &employee.id,
            assigner_id,
            context,
            now,
        );

        let task_id = task_id.to_string();
        let employee_id = employee.id.clone();
        let db = self.db_mut();

        storage::with_retry(|| {
            let tx = db.transaction()?;
            if sqlite::get_open_assignment(&tx, &task_id)?.is_some() {
                return Err(TmError::AlreadyAssigned(task_id.clone()));
            }
            sqlite::insert_assignment(&tx, &assignment)?;
            sqlite::set_task_assignee(&tx, &task_id, Some(&employee_id), now)?;
            sqlite::adjust_workload(&tx, &employee_id, 1, now)?;
            tx.commit()?;
            Ok(())
        })?;

        info!(task = %task_id, employee = %employee_id, "assignment committed");
        Ok(assignment)
    }
}
