//! Assignment & learning engine.
//!
//! Two entry flows: [`Engine::assign_task`] runs the selection pipeline
//! (similarity filter, feature extraction, LinUCB) and commits one
//! assignment; [`Engine::complete_task`] turns completion facts into a
//! reward, persists feedback, and updates the chosen arm, all in one
//! transaction.

pub mod assigner;
pub mod bandit;
pub mod features;
pub mod ingestor;
pub mod reward;
pub mod similarity;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::core::{Employee, SkillProfile, Task};
use crate::embedding::{skills_hash, Embedder};
use crate::error::{Result, TmError};
use crate::storage::Database;

pub use assigner::{AssignMode, Recommendation};
pub use reward::CompletionKind;

/// The assignment & learning engine: storage, embedder, clock, tunables.
pub struct Engine {
    db: Database,
    embedder: Box<dyn Embedder>,
    clock: Box<dyn Clock>,
    config: EngineConfig,
}

/// Learned-state overview for one arm, for operator inspection.
#[derive(Debug, Clone, Serialize)]
pub struct ArmSummary {
    pub employee_id: String,
    pub name: String,
    pub update_count: u64,
    pub feedback_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_reward: Option<f64>,
}

impl Engine {
    #[must_use]
    pub fn new(
        db: Database,
        embedder: Box<dyn Embedder>,
        clock: Box<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            embedder,
            clock,
            config,
        }
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register an employee, eagerly filling the embedding cache.
    ///
    /// Provider failure is non-fatal: the employee is stored without a
    /// cache and similarity falls back to zero until one exists.
    pub fn add_employee(
        &mut self,
        name: &str,
        skills: Vec<SkillProfile>,
        productivity_score: f64,
    ) -> Result<Employee> {
        let now = self.now();
        let mut employee = Employee::new(
            Uuid::new_v4().to_string(),
            name,
            skills,
            productivity_score,
            now,
        );

        let names = employee.skill_names();
        match self.embedder.embed_batch(&names) {
            Ok(embeddings) => {
                employee.skills_hash = Some(skills_hash(
                    &names,
                    self.embedder.backend(),
                    self.embedder.dims(),
                ));
                employee.skill_embeddings = Some(embeddings);
            }
            Err(err) => {
                warn!(employee = %employee.id, %err, "skill embedding generation failed; storing without cache");
            }
        }

        self.db.insert_employee(&employee)?;
        debug!(employee = %employee.id, skills = employee.skills.len(), "employee registered");
        Ok(employee)
    }

    /// Create a task, eagerly filling the embedding cache.
    pub fn add_task(
        &mut self,
        title: &str,
        description: &str,
        priority: u8,
        difficulty: u8,
        required_skills: Vec<String>,
        creator_id: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Task> {
        let now = self.now();
        let mut task = Task::new(
            Uuid::new_v4().to_string(),
            title,
            description,
            priority,
            difficulty,
            required_skills,
            creator_id,
            due_date,
            now,
        )?;

        match self.embedder.embed_batch(&task.required_skills) {
            Ok(embeddings) => {
                task.skills_hash = Some(skills_hash(
                    &task.required_skills,
                    self.embedder.backend(),
                    self.embedder.dims(),
                ));
                task.skill_embeddings = Some(embeddings);
            }
            Err(err) => {
                warn!(task = %task.id, %err, "task embedding generation failed; storing without cache");
            }
        }

        self.db.insert_task(&task)?;
        debug!(task = %task.id, priority, difficulty, "task created");
        Ok(task)
    }

    /// Learned-state overview across all persisted arms.
    pub fn stats(&self) -> Result<Vec<ArmSummary>> {
        let rewards: std::collections::HashMap<String, (u64, f64)> = self
            .db
            .feedback_summary()?
            .into_iter()
            .map(|(id, count, mean)| (id, (count, mean)))
            .collect();

        let mut summaries = Vec::new();
        for (arm_id, update_count) in self.db.list_arms()? {
            let name = self
                .db
                .get_employee(&arm_id)?
                .map_or_else(String::new, |e| e.name);
            let (feedback_count, mean_reward) = rewards
                .get(&arm_id)
                .map_or((0, None), |(count, mean)| (*count, Some(*mean)));
            summaries.push(ArmSummary {
                employee_id: arm_id,
                name,
                update_count,
                feedback_count,
                mean_reward,
            });
        }
        Ok(summaries)
    }

    /// Make sure the task's embedding cache matches its current skill
    /// list, regenerating through the provider when it does not.
    ///
    /// Returns without error on provider failure; the caller proceeds
    /// with whatever cache (possibly none) the task has.
    pub(crate) fn ensure_task_cache(&self, task: &mut Task) {
        if task.required_skills.is_empty() {
            return;
        }
        let expected = skills_hash(
            &task.required_skills,
            self.embedder.backend(),
            self.embedder.dims(),
        );
        if task.skills_hash.as_deref() == Some(expected.as_str())
            && task.cached_embeddings().is_some()
        {
            return;
        }

        match self.embedder.embed_batch(&task.required_skills) {
            Ok(embeddings) => {
                if let Err(err) = self.db.update_task_embeddings(
                    &task.id,
                    &embeddings,
                    self.embedder.dims(),
                    &expected,
                    self.now(),
                ) {
                    warn!(task = %task.id, %err, "failed to persist task embedding cache");
                }
                task.skill_embeddings = Some(embeddings);
                task.skills_hash = Some(expected);
            }
            Err(err) => {
                warn!(task = %task.id, %err, "embedding provider unavailable; proceeding without task embeddings");
                task.skill_embeddings = None;
            }
        }
    }

    /// Employee-side counterpart of [`Engine::ensure_task_cache`].
    pub(crate) fn ensure_employee_cache(&self, employee: &mut Employee) {
        if employee.skills.is_empty() {
            return;
        }
        let names = employee.skill_names();
        let expected = skills_hash(&names, self.embedder.backend(), self.embedder.dims());
        if employee.skills_hash.as_deref() == Some(expected.as_str())
            && employee.cached_embeddings().is_some()
        {
            return;
        }

        match self.embedder.embed_batch(&names) {
            Ok(embeddings) => {
                if let Err(err) = self.db.update_employee_embeddings(
                    &employee.id,
                    &embeddings,
                    self.embedder.dims(),
                    &expected,
                    self.now(),
                ) {
                    warn!(employee = %employee.id, %err, "failed to persist employee embedding cache");
                }
                employee.skill_embeddings = Some(embeddings);
                employee.skills_hash = Some(expected);
            }
            Err(err) => {
                warn!(employee = %employee.id, %err, "embedding provider unavailable; employee keeps similarity 0");
                employee.skill_embeddings = None;
            }
        }
    }

    pub(crate) fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Load the task or fail with `UnknownTask`.
    pub(crate) fn require_task(&self, task_id: &str) -> Result<Task> {
        self.db
            .get_task(task_id)?
            .ok_or_else(|| TmError::UnknownTask(task_id.to_string()))
    }
}
