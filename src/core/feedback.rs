//! Feedback record: reward components derived from one task completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::ContextVector;

/// The six reward components plus derived totals.
///
/// `raw_reward` is the pre-clip sum of the six components;
/// `reward_value` is `raw_reward` clamped to the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardComponents {
    pub r_completion: f64,
    pub r_ontime: f64,
    pub r_good_behaviour: f64,
    pub p_overdue: f64,
    pub p_rework: f64,
    pub p_failure: f64,
    pub overdue_days: u32,
    pub raw_reward: f64,
    pub reward_value: f64,
}

/// Structured learning signal persisted once per completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub task_id: String,
    pub employee_id: String,
    pub components: RewardComponents,

    /// Copied verbatim from the assignment row, never recomputed.
    pub context: ContextVector,

    pub created_at: DateTime<Utc>,
}
