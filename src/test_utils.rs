//! Shared fixtures for unit and integration tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::clock::FixedClock;
use crate::config::EngineConfig;
use crate::core::{Employee, SkillProfile, Task};
use crate::embedding::HashEmbedder;
use crate::engine::Engine;
use crate::storage::Database;

/// A fixed instant all engine tests start from.
#[must_use]
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

/// In-memory engine with a deterministic embedder and a pinned clock.
///
/// The returned clock handle drives the same clock the engine reads.
#[must_use]
pub fn test_engine() -> (Engine, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(test_epoch()));
    let db = Database::open_in_memory().expect("in-memory database");
    let engine = Engine::new(
        db,
        Box::new(HashEmbedder::new(32)),
        Box::new(Arc::clone(&clock)),
        EngineConfig::default(),
    );
    (engine, clock)
}

/// Register an employee whose listed skills carry 24/12 months of
/// experience/tenure each.
pub fn add_employee(
    engine: &mut Engine,
    name: &str,
    skills: &[&str],
    productivity: f64,
) -> Employee {
    let skills = skills
        .iter()
        .map(|s| SkillProfile::with_months(*s, 24, 12))
        .collect();
    engine
        .add_employee(name, skills, productivity)
        .expect("add employee")
}

/// Create a task due `due_in_hours` from the engine's current time.
pub fn add_task(
    engine: &mut Engine,
    skills: &[&str],
    priority: u8,
    difficulty: u8,
    due_in_hours: Option<i64>,
) -> Task {
    let due = due_in_hours.map(|h| engine_now(engine) + Duration::hours(h));
    engine
        .add_task(
            "Ship the exporter",
            "",
            priority,
            difficulty,
            skills.iter().map(|s| (*s).to_string()).collect(),
            "admin",
            due,
        )
        .expect("add task")
}

fn engine_now(engine: &Engine) -> DateTime<Utc> {
    engine.now()
}
