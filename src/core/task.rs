//! Task domain type and status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TmError};

/// Task lifecycle status. Progression is `todo -> in_progress -> review -> done`;
/// the engine only ever writes `done` (on completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "done" => Ok(Self::Done),
            other => Err(TmError::InvalidTask(format!("unknown status: {other}"))),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work to be matched to one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,

    /// 1..=5, higher is more urgent.
    pub priority: u8,

    /// 1..=10.
    pub difficulty: u8,

    pub required_skills: Vec<String>,

    /// Cached per-skill unit embeddings, one vector per required skill.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_embeddings: Option<Vec<Vec<f32>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_hash: Option<String>,

    pub status: TaskStatus,
    pub creator_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task in `todo` status, validating field ranges.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: u8,
        difficulty: u8,
        required_skills: Vec<String>,
        creator_id: impl Into<String>,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !(1..=5).contains(&priority) {
            return Err(TmError::InvalidTask(format!(
                "priority must be 1..=5, got {priority}"
            )));
        }
        if !(1..=10).contains(&difficulty) {
            return Err(TmError::InvalidTask(format!(
                "difficulty must be 1..=10, got {difficulty}"
            )));
        }

        Ok(Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            priority,
            difficulty,
            required_skills,
            skill_embeddings: None,
            skills_hash: None,
            status: TaskStatus::Todo,
            creator_id: creator_id.into(),
            assignee_id: None,
            due_date,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Cached embeddings if present and consistent with the skill count.
    #[must_use]
    pub fn cached_embeddings(&self) -> Option<&[Vec<f32>]> {
        match &self.skill_embeddings {
            Some(embs) if embs.len() == self.required_skills.len() => Some(embs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(priority: u8, difficulty: u8) -> Result<Task> {
        Task::new(
            "t1",
            "Fix pagination",
            "",
            priority,
            difficulty,
            vec!["rust".into()],
            "admin",
            None,
            Utc::now(),
        )
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(new_task(0, 5).is_err());
        assert!(new_task(6, 5).is_err());
        assert!(new_task(3, 0).is_err());
        assert!(new_task(3, 11).is_err());
        assert!(new_task(1, 1).is_ok());
        assert!(new_task(5, 10).is_ok());
    }

    #[test]
    fn status_roundtrip() {
        for status in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::Review,
            TaskStatus::Done,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TaskStatus::parse("cancelled").is_err());
    }

    #[test]
    fn new_task_starts_todo_and_unassigned() {
        let t = new_task(3, 4).unwrap();
        assert_eq!(t.status, TaskStatus::Todo);
        assert!(t.assignee_id.is_none());
        assert!(!t.is_done());
    }
}
