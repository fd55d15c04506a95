//! Context feature extraction for (task, employee) pairs.
//!
//! Produces the 8-dimensional vector the bandit consumes. Every component
//! is min-max normalized into [0, 1]; out-of-range inputs are clamped.
//! The same extractor runs at selection time and nowhere else: learning
//! reads the stored vector back from the assignment row.

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::core::{ContextVector, Employee, Task};

/// Build the context vector for one candidate.
///
/// `similarity` is the mean-pairwise skill cosine computed by the
/// similarity filter for this employee (0 when either side has no
/// embeddings).
#[must_use]
pub fn extract(
    task: &Task,
    employee: &Employee,
    similarity: f64,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> ContextVector {
    let productivity = clamp01(employee.productivity_score);

    let cap = f64::from(config.workload_cap.max(1));
    let idleness = 1.0 - f64::from(employee.workload).min(cap) / cap;

    let priority = f64::from(task.priority - 1) / 4.0;
    let difficulty = f64::from(task.difficulty - 1) / 9.0;

    let urgency = task.due_date.map_or(0.0, |due| {
        let hours_until_due = (due - now).num_seconds() as f64 / 3600.0;
        let horizon = config.urgency_horizon_hours;
        clamp01((horizon - hours_until_due) / horizon)
    });

    let (experience, tenure) = skill_depth(task, employee, config.skill_norm_months);

    ContextVector::new([
        productivity,
        idleness,
        clamp01(priority),
        clamp01(difficulty),
        clamp01(similarity),
        urgency,
        experience,
        tenure,
    ])
}

/// Mean normalized experience and tenure over the required skills the
/// employee actually has; both 0 when there is no overlap.
fn skill_depth(task: &Task, employee: &Employee, norm_months: f64) -> (f64, f64) {
    let mut experience_sum = 0.0;
    let mut tenure_sum = 0.0;
    let mut matched = 0u32;

    for required in &task.required_skills {
        if let Some(skill) = employee.find_skill(required) {
            matched += 1;
            experience_sum += clamp01(f64::from(skill.experience_months.unwrap_or(0)) / norm_months);
            tenure_sum += clamp01(f64::from(skill.tenure_months.unwrap_or(0)) / norm_months);
        }
    }

    if matched == 0 {
        (0.0, 0.0)
    } else {
        let n = f64::from(matched);
        (experience_sum / n, tenure_sum / n)
    }
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SkillProfile;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn task_with(priority: u8, difficulty: u8, due: Option<DateTime<Utc>>) -> Task {
        let mut task = Task::new(
            "t1",
            "Ship exporter",
            "",
            priority,
            difficulty,
            vec!["rust".into(), "sql".into()],
            "admin",
            due,
            now(),
        )
        .unwrap();
        task.skill_embeddings = None;
        task
    }

    fn employee_with(workload: u32, productivity: f64, skills: Vec<SkillProfile>) -> Employee {
        let mut e = Employee::new("e1", "Ada", skills, productivity, now());
        e.workload = workload;
        e
    }

    #[test]
    fn components_use_documented_ranges() {
        let task = task_with(3, 2, Some(now() + Duration::hours(48)));
        let employee = employee_with(
            2,
            0.9,
            vec![
                SkillProfile::with_months("rust", 30, 15),
                SkillProfile::with_months("sql", 30, 15),
            ],
        );

        let ctx = extract(&task, &employee, 0.31, now(), &EngineConfig::default());
        let v = ctx.as_slice();

        assert!((v[0] - 0.9).abs() < 1e-12); // productivity
        assert!((v[1] - 0.8).abs() < 1e-12); // 1 - 2/10
        assert!((v[2] - 0.5).abs() < 1e-12); // (3-1)/4
        assert!((v[3] - 1.0 / 9.0).abs() < 1e-12); // (2-1)/9
        assert!((v[4] - 0.31).abs() < 1e-12); // similarity passthrough
        assert!((v[5] - 1.0 / 3.0).abs() < 1e-12); // (72-48)/72
        assert!((v[6] - 0.5).abs() < 1e-12); // 30/60
        assert!((v[7] - 0.25).abs() < 1e-12); // 15/60
    }

    #[test]
    fn urgency_boundaries() {
        let config = EngineConfig::default();
        let employee = employee_with(0, 0.5, vec![]);

        // Past due: saturates at 1.
        let overdue = task_with(3, 2, Some(now() - Duration::hours(5)));
        assert!((extract(&overdue, &employee, 0.0, now(), &config).as_slice()[5] - 1.0).abs() < 1e-12);

        // Exactly the horizon away: 0.
        let far = task_with(3, 2, Some(now() + Duration::hours(72)));
        assert!(extract(&far, &employee, 0.0, now(), &config).as_slice()[5].abs() < 1e-12);

        // Beyond the horizon: clamped to 0.
        let very_far = task_with(3, 2, Some(now() + Duration::hours(300)));
        assert!(extract(&very_far, &employee, 0.0, now(), &config).as_slice()[5].abs() < 1e-12);

        // No due date: no urgency.
        let relaxed = task_with(3, 2, None);
        assert!(extract(&relaxed, &employee, 0.0, now(), &config).as_slice()[5].abs() < 1e-12);
    }

    #[test]
    fn workload_saturates_at_cap() {
        let config = EngineConfig::default();
        let task = task_with(1, 1, None);

        let idle = employee_with(0, 0.5, vec![]);
        assert!((extract(&task, &idle, 0.0, now(), &config).as_slice()[1] - 1.0).abs() < 1e-12);

        let slammed = employee_with(25, 0.5, vec![]);
        assert!(extract(&task, &slammed, 0.0, now(), &config).as_slice()[1].abs() < 1e-12);
    }

    #[test]
    fn skill_depth_means_only_matched_skills() {
        let config = EngineConfig::default();
        let task = task_with(3, 5, None);

        // Has rust (60 months, saturates) but not sql; mean over the one match.
        let employee = employee_with(0, 0.5, vec![SkillProfile::with_months("Rust", 60, 120)]);
        let v = extract(&task, &employee, 0.0, now(), &config);
        assert!((v.as_slice()[6] - 1.0).abs() < 1e-12);
        assert!((v.as_slice()[7] - 1.0).abs() < 1e-12);

        // No overlap at all: both zero.
        let stranger = employee_with(0, 0.5, vec![SkillProfile::with_months("design", 24, 24)]);
        let v = extract(&task, &stranger, 0.0, now(), &config);
        assert!(v.as_slice()[6].abs() < 1e-12);
        assert!(v.as_slice()[7].abs() < 1e-12);
    }

    #[test]
    fn missing_months_count_as_zero() {
        let config = EngineConfig::default();
        let task = task_with(3, 5, None);
        let employee = employee_with(0, 0.5, vec![SkillProfile::named("rust")]);

        let v = extract(&task, &employee, 0.0, now(), &config);
        assert!(v.as_slice()[6].abs() < 1e-12);
        assert!(v.as_slice()[7].abs() < 1e-12);
    }

    #[test]
    fn similarity_is_clamped() {
        let config = EngineConfig::default();
        let task = task_with(3, 5, None);
        let employee = employee_with(0, 0.5, vec![]);

        let v = extract(&task, &employee, 1.7, now(), &config);
        assert!((v.as_slice()[4] - 1.0).abs() < 1e-12);
    }
}
