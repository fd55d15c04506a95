//! Reward derivation from completion facts.
//!
//! No user rating is involved: the reward is a deterministic function of
//! timestamps, difficulty, rework count, and how the task was closed.
//! `raw_reward` is the unclamped component sum; `reward_value` is what
//! the bandit learns from, clamped to the configured bounds.

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::core::RewardComponents;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How the task left the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// Normal completion by the assignee.
    Completed,
    /// Administratively closed as a failure.
    ForceClosed,
}

/// Facts the calculator consumes; all come from stored rows plus the clock.
#[derive(Debug, Clone)]
pub struct RewardInputs {
    pub difficulty: u8,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub rework_count: u32,
    pub kind: CompletionKind,
}

/// Days a task of this difficulty is expected to take.
#[must_use]
pub fn expected_days(difficulty: u8, config: &EngineConfig) -> f64 {
    (f64::from(difficulty) * config.days_per_difficulty).max(config.min_expected_days)
}

/// Derive all six components and the bounded reward.
#[must_use]
pub fn compute(inputs: &RewardInputs, config: &EngineConfig) -> RewardComponents {
    let completion_days =
        (inputs.completed_at - inputs.assigned_at).num_seconds() as f64 / SECONDS_PER_DAY;

    let overdue_days: u32 = inputs.due_date.map_or(0, |due| {
        let late_seconds = (inputs.completed_at - due).num_seconds();
        if late_seconds <= 0 {
            0
        } else {
            u32::try_from(late_seconds / 86_400).unwrap_or(u32::MAX)
        }
    });

    let failed = inputs.kind == CompletionKind::ForceClosed;

    let r_completion = config.completion_reward;

    let on_time = inputs
        .due_date
        .is_none_or(|due| inputs.completed_at <= due);
    let r_ontime = if !failed && on_time {
        config.ontime_bonus
    } else {
        0.0
    };

    let r_good_behaviour = if !failed && completion_days <= expected_days(inputs.difficulty, config)
    {
        config.good_behaviour_bonus
    } else {
        0.0
    };

    let p_overdue =
        -config.overdue_penalty_per_day * f64::from(overdue_days.min(config.overdue_cap_days));
    let p_rework = -config.rework_penalty * f64::from(inputs.rework_count);
    let p_failure = if failed { -config.failure_penalty } else { 0.0 };

    let raw_reward = r_completion + r_ontime + r_good_behaviour + p_overdue + p_rework + p_failure;
    let reward_value = raw_reward.clamp(config.reward_floor, config.reward_ceiling);

    RewardComponents {
        r_completion,
        r_ontime,
        r_good_behaviour,
        p_overdue,
        p_rework,
        p_failure,
        overdue_days,
        raw_reward,
        reward_value,
    }
}
