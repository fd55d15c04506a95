//! Feedback ingestor: completion, force-close, rework marking.
//!
//! Completion is one transaction: feedback row, bandit update, assignment
//! close, task status, workload decrement. Either all of it commits or
//! none of it does; the bandit never sees a reward whose feedback row was
//! not persisted.

use tracing::info;
use uuid::Uuid;

use crate::core::{Feedback, TaskStatus};
use crate::error::{Result, TmError};
use crate::storage::{self, sqlite};

use super::bandit::ArmState;
use super::reward::{self, CompletionKind, RewardInputs};
use super::Engine;

impl Engine {
    /// Complete a task normally.
    pub fn complete_task(&mut self, task_id: &str) -> Result<Feedback> {
        self.ingest_completion(task_id, CompletionKind::Completed)
    }

    /// Close a task as a failure; the reward applies the failure penalty
    /// and withholds the on-time and good-behaviour bonuses.
    pub fn force_close_task(&mut self, task_id: &str) -> Result<Feedback> {
        self.ingest_completion(task_id, CompletionKind::ForceClosed)
    }

    /// Record that the open assignment needed rework; each increment
    /// subtracts the configured penalty from the eventual reward.
    pub fn mark_rework(&mut self, task_id: &str) -> Result<u32> {
        let task = self.require_task(task_id)?;
        if task.is_done() {
            return Err(TmError::AlreadyCompleted(task_id.to_string()));
        }
        let assignment = self
            .database()
            .get_open_assignment(task_id)?
            .ok_or_else(|| TmError::NotAssigned(task_id.to_string()))?;

        let assignment_id = assignment.id;
        let db = self.db_mut();
        let count = storage::with_retry(|| {
            let tx = db.transaction()?;
            let count = sqlite::increment_rework(&tx, &assignment_id)?;
            tx.commit()?;
            Ok(count)
        })?;
        info!(task = %task_id, rework_count = count, "rework recorded");
        Ok(count)
    }

    fn ingest_completion(&mut self, task_id: &str, kind: CompletionKind) -> Result<Feedback> {
        let task = self.require_task(task_id)?;
        if task.is_done() || self.database().get_feedback(task_id)?.is_some() {
            return Err(TmError::AlreadyCompleted(task_id.to_string()));
        }
        let assignment = self
            .database()
            .get_open_assignment(task_id)?
            .ok_or_else(|| TmError::NotAssigned(task_id.to_string()))?;

        let now = self.now();
        let components = reward::compute(
            &RewardInputs {
                difficulty: task.difficulty,
                due_date: task.due_date,
                assigned_at: assignment.assigned_at,
                completed_at: now,
                rework_count: assignment.rework_count,
                kind,
            },
            self.config(),
        );

        let feedback = Feedback {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            employee_id: assignment.employee_id.clone(),
            components,
            // Authoritative context: read back from the assignment row.
            context: assignment.context.clone(),
            created_at: now,
        };

        let lambda = self.config().lambda;
        let assignment_id = assignment.id.clone();
        let employee_id = assignment.employee_id.clone();
        let context = assignment.context.clone();
        let reward_value = components.reward_value;
        let task_id_owned = task_id.to_string();
        let db = self.db_mut();

        storage::with_retry(|| {
            let tx = db.transaction()?;

            // The unique constraint turns a concurrent duplicate into
            // AlreadyCompleted and rolls everything back.
            sqlite::insert_feedback(&tx, &feedback)?;

            let mut arm = sqlite::get_arm(&tx, &employee_id)?
                .unwrap_or_else(|| ArmState::cold(lambda));
            arm.observe(&context, reward_value);
            sqlite::upsert_arm(&tx, &employee_id, &arm, now)?;

            sqlite::close_assignment(&tx, &assignment_id, now)?;
            sqlite::set_task_status(&tx, &task_id_owned, TaskStatus::Done, now)?;
            sqlite::adjust_workload(&tx, &employee_id, -1, now)?;

            tx.commit()?;
            Ok(())
        })?;

        info!(
            task = %task_id,
            employee = %employee_id,
            reward = reward_value,
            overdue_days = components.overdue_days,
            "completion ingested"
        );
        Ok(feedback)
    }
}
