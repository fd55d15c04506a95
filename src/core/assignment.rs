//! Assignment record linking a task to the employee working it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::ContextVector;

/// One task-to-employee assignment.
///
/// The context vector is frozen at selection time; once `completed_at`
/// is set the record is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub task_id: String,
    pub employee_id: String,
    pub assigner_id: String,
    pub context: ContextVector,
    pub rework_count: u32,
    pub assigned_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Assignment {
    #[must_use]
    pub fn open(
        id: impl Into<String>,
        task_id: impl Into<String>,
        employee_id: impl Into<String>,
        assigner_id: impl Into<String>,
        context: ContextVector,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            task_id: task_id.into(),
            employee_id: employee_id.into(),
            assigner_id: assigner_id.into(),
            context,
            rework_count: 0,
            assigned_at,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}
