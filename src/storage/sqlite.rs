//! SQLite database layer

use std::path::Path;

use chrono::{DateTime, Utc};
use half::f16;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::warn;

use crate::core::{
    Assignment, ContextVector, Employee, Feedback, RewardComponents, SkillProfile, Task, TaskStatus,
};
use crate::engine::bandit::ArmState;
use crate::error::{Result, TmError};
use crate::storage::migrations;

/// SQLite database wrapper for the assignment engine.
pub struct Database {
    conn: Connection,
    schema_version: u32,
}

impl Database {
    /// Open database at the given path, creating and migrating as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn,
            schema_version,
        })
    }

    /// Get a reference to the connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Current schema version after migrations.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Begin an immediate (write-locking) transaction.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    // ========================================================================
    // Employees
    // ========================================================================

    pub fn insert_employee(&self, employee: &Employee) -> Result<()> {
        let (blob, dims) = match &employee.skill_embeddings {
            Some(embs) => (
                Some(encode_embeddings_f16(embs)),
                embs.first().map(|v| v.len() as i64),
            ),
            None => (None, None),
        };
        self.conn.execute(
            "INSERT INTO employees (
                id, name, skills_json, skill_embeddings, embedding_dims, skills_hash,
                productivity_score, workload, active, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                employee.id,
                employee.name,
                serde_json::to_string(&employee.skills)?,
                blob,
                dims,
                employee.skills_hash,
                employee.productivity_score,
                i64::from(employee.workload),
                employee.active,
                dt_to_sql(&employee.created_at),
                dt_to_sql(&employee.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_employee(&self, id: &str) -> Result<Option<Employee>> {
        get_employee(&self.conn, id)
    }

    pub fn list_employees(&self, active_only: bool) -> Result<Vec<Employee>> {
        let sql = if active_only {
            "SELECT id, name, skills_json, skill_embeddings, embedding_dims, skills_hash, \
             productivity_score, workload, active, created_at, updated_at \
             FROM employees WHERE active = 1 ORDER BY id"
        } else {
            "SELECT id, name, skills_json, skill_embeddings, embedding_dims, skills_hash, \
             productivity_score, workload, active, created_at, updated_at \
             FROM employees ORDER BY id"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            results.push(employee_from_row(row)?);
        }
        Ok(results)
    }

    /// Refresh the cached skill embeddings for an employee.
    pub fn update_employee_embeddings(
        &self,
        id: &str,
        embeddings: &[Vec<f32>],
        dims: usize,
        skills_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        validate_dims(embeddings, dims)?;
        let changed = self.conn.execute(
            "UPDATE employees SET skill_embeddings = ?, embedding_dims = ?, skills_hash = ?, \
             updated_at = ? WHERE id = ?",
            params![
                encode_embeddings_f16(embeddings),
                dims as i64,
                skills_hash,
                dt_to_sql(&now),
                id
            ],
        )?;
        if changed == 0 {
            return Err(TmError::UnknownEmployee(id.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        let (blob, dims) = match &task.skill_embeddings {
            Some(embs) => (
                Some(encode_embeddings_f16(embs)),
                embs.first().map(|v| v.len() as i64),
            ),
            None => (None, None),
        };
        self.conn.execute(
            "INSERT INTO tasks (
                id, title, description, priority, difficulty, required_skills_json,
                skill_embeddings, embedding_dims, skills_hash, status, creator_id,
                assignee_id, due_date, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                task.id,
                task.title,
                task.description,
                i64::from(task.priority),
                i64::from(task.difficulty),
                serde_json::to_string(&task.required_skills)?,
                blob,
                dims,
                task.skills_hash,
                task.status.as_str(),
                task.creator_id,
                task.assignee_id,
                task.due_date.as_ref().map(dt_to_sql),
                dt_to_sql(&task.created_at),
                dt_to_sql(&task.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        get_task(&self.conn, id)
    }

    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let mut results = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = self.conn.prepare(&format!("{TASK_SELECT} WHERE status = ? ORDER BY created_at DESC"))?;
                let mut rows = stmt.query([status.as_str()])?;
                while let Some(row) = rows.next()? {
                    results.push(task_from_row(row)?);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{TASK_SELECT} ORDER BY created_at DESC"))?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    results.push(task_from_row(row)?);
                }
            }
        }
        Ok(results)
    }

    /// Refresh the cached skill embeddings for a task.
    pub fn update_task_embeddings(
        &self,
        id: &str,
        embeddings: &[Vec<f32>],
        dims: usize,
        skills_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        validate_dims(embeddings, dims)?;
        let changed = self.conn.execute(
            "UPDATE tasks SET skill_embeddings = ?, embedding_dims = ?, skills_hash = ?, \
             updated_at = ? WHERE id = ?",
            params![
                encode_embeddings_f16(embeddings),
                dims as i64,
                skills_hash,
                dt_to_sql(&now),
                id
            ],
        )?;
        if changed == 0 {
            return Err(TmError::UnknownTask(id.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Assignments / feedback / bandit reads
    // ========================================================================

    pub fn get_open_assignment(&self, task_id: &str) -> Result<Option<Assignment>> {
        get_open_assignment(&self.conn, task_id)
    }

    pub fn get_feedback(&self, task_id: &str) -> Result<Option<Feedback>> {
        get_feedback(&self.conn, task_id)
    }

    pub fn get_arm(&self, arm_id: &str) -> Result<Option<ArmState>> {
        get_arm(&self.conn, arm_id)
    }

    /// (arm_id, update_count) for every persisted arm.
    pub fn list_arms(&self) -> Result<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT arm_id, update_count FROM bandit_state ORDER BY arm_id")?;
        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let count: i64 = row.get(1)?;
            results.push((row.get(0)?, count.max(0) as u64));
        }
        Ok(results)
    }

    /// (employee_id, feedback_count, mean_reward) grouped over feedback rows.
    pub fn feedback_summary(&self) -> Result<Vec<(String, u64, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT employee_id, COUNT(*), AVG(reward_value) \
             FROM feedback GROUP BY employee_id ORDER BY employee_id",
        )?;
        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let count: i64 = row.get(1)?;
            results.push((row.get(0)?, count.max(0) as u64, row.get(2)?));
        }
        Ok(results)
    }
}

// ============================================================================
// Row operations shared between plain reads and open transactions.
// `Transaction` derefs to `Connection`, so these run in either context.
// ============================================================================

const EMPLOYEE_SELECT: &str = "SELECT id, name, skills_json, skill_embeddings, embedding_dims, \
     skills_hash, productivity_score, workload, active, created_at, updated_at FROM employees";

const TASK_SELECT: &str = "SELECT id, title, description, priority, difficulty, \
     required_skills_json, skill_embeddings, embedding_dims, skills_hash, status, creator_id, \
     assignee_id, due_date, created_at, updated_at FROM tasks";

const ASSIGNMENT_SELECT: &str = "SELECT id, task_id, employee_id, assigner_id, context_vector, \
     rework_count, assigned_at, completed_at FROM assignments";

pub fn get_employee(conn: &Connection, id: &str) -> Result<Option<Employee>> {
    let mut stmt = conn.prepare(&format!("{EMPLOYEE_SELECT} WHERE id = ?"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(employee_from_row(row)?));
    }
    Ok(None)
}

pub fn get_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT} WHERE id = ?"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(task_from_row(row)?));
    }
    Ok(None)
}

pub fn get_open_assignment(conn: &Connection, task_id: &str) -> Result<Option<Assignment>> {
    let mut stmt =
        conn.prepare(&format!("{ASSIGNMENT_SELECT} WHERE task_id = ? AND completed_at IS NULL"))?;
    let mut rows = stmt.query([task_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(assignment_from_row(row)?));
    }
    Ok(None)
}

/// Insert a new open assignment. A second open assignment for the same
/// task violates the partial unique index and surfaces as `AlreadyAssigned`.
pub fn insert_assignment(conn: &Connection, assignment: &Assignment) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO assignments (
            id, task_id, employee_id, assigner_id, context_vector, rework_count,
            assigned_at, completed_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            assignment.id,
            assignment.task_id,
            assignment.employee_id,
            assignment.assigner_id,
            assignment.context.to_bytes(),
            i64::from(assignment.rework_count),
            dt_to_sql(&assignment.assigned_at),
            assignment.completed_at.as_ref().map(dt_to_sql),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => {
            Err(TmError::AlreadyAssigned(assignment.task_id.clone()))
        }
        Err(err) => Err(err.into()),
    }
}

/// Stamp `completed_at` on an open assignment; the row is immutable after.
pub fn close_assignment(
    conn: &Connection,
    assignment_id: &str,
    completed_at: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE assignments SET completed_at = ? WHERE id = ? AND completed_at IS NULL",
        params![dt_to_sql(&completed_at), assignment_id],
    )?;
    if changed == 0 {
        return Err(TmError::InvariantViolated(format!(
            "assignment {assignment_id} is not open"
        )));
    }
    Ok(())
}

/// Bump the rework counter on an open assignment; returns the new count.
pub fn increment_rework(conn: &Connection, assignment_id: &str) -> Result<u32> {
    let changed = conn.execute(
        "UPDATE assignments SET rework_count = rework_count + 1 \
         WHERE id = ? AND completed_at IS NULL",
        [assignment_id],
    )?;
    if changed == 0 {
        return Err(TmError::InvariantViolated(format!(
            "assignment {assignment_id} is not open"
        )));
    }
    let count: i64 = conn.query_row(
        "SELECT rework_count FROM assignments WHERE id = ?",
        [assignment_id],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u32)
}

pub fn set_task_assignee(
    conn: &Connection,
    task_id: &str,
    assignee_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE tasks SET assignee_id = ?, updated_at = ? WHERE id = ?",
        params![assignee_id, dt_to_sql(&now), task_id],
    )?;
    if changed == 0 {
        return Err(TmError::UnknownTask(task_id.to_string()));
    }
    Ok(())
}

pub fn set_task_status(
    conn: &Connection,
    task_id: &str,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?",
        params![status.as_str(), dt_to_sql(&now), task_id],
    )?;
    if changed == 0 {
        return Err(TmError::UnknownTask(task_id.to_string()));
    }
    Ok(())
}

/// Adjust an employee's workload counter, flooring at zero.
pub fn adjust_workload(
    conn: &Connection,
    employee_id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<u32> {
    let current: i64 = conn
        .query_row(
            "SELECT workload FROM employees WHERE id = ?",
            [employee_id],
            |row| row.get(0),
        )
        .map_err(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => {
                TmError::UnknownEmployee(employee_id.to_string())
            }
            other => other.into(),
        })?;

    let next = current + delta;
    if next < 0 {
        warn!(employee_id, current, delta, "workload would go negative; flooring at 0");
    }
    let next = next.max(0);

    conn.execute(
        "UPDATE employees SET workload = ?, updated_at = ? WHERE id = ?",
        params![next, dt_to_sql(&now), employee_id],
    )?;
    Ok(next as u32)
}

/// Insert the feedback row; a duplicate task surfaces as `AlreadyCompleted`.
pub fn insert_feedback(conn: &Connection, feedback: &Feedback) -> Result<()> {
    let c = &feedback.components;
    let result = conn.execute(
        "INSERT INTO feedback (
            id, task_id, employee_id, r_completion, r_ontime, r_good_behaviour,
            p_overdue, p_rework, p_failure, raw_reward, reward_value, overdue_days,
            context_vector, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            feedback.id,
            feedback.task_id,
            feedback.employee_id,
            c.r_completion,
            c.r_ontime,
            c.r_good_behaviour,
            c.p_overdue,
            c.p_rework,
            c.p_failure,
            c.raw_reward,
            c.reward_value,
            i64::from(c.overdue_days),
            feedback.context.to_bytes(),
            dt_to_sql(&feedback.created_at),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => {
            Err(TmError::AlreadyCompleted(feedback.task_id.clone()))
        }
        Err(err) => Err(err.into()),
    }
}

pub fn get_feedback(conn: &Connection, task_id: &str) -> Result<Option<Feedback>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, employee_id, r_completion, r_ontime, r_good_behaviour, \
         p_overdue, p_rework, p_failure, raw_reward, reward_value, overdue_days, \
         context_vector, created_at FROM feedback WHERE task_id = ?",
    )?;
    let mut rows = stmt.query([task_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(feedback_from_row(row)?));
    }
    Ok(None)
}

pub fn get_arm(conn: &Connection, arm_id: &str) -> Result<Option<ArmState>> {
    let mut stmt = conn.prepare(
        "SELECT a_matrix, b_vector, update_count FROM bandit_state WHERE arm_id = ?",
    )?;
    let mut rows = stmt.query([arm_id])?;
    if let Some(row) = rows.next()? {
        let a_blob: Vec<u8> = row.get(0)?;
        let b_blob: Vec<u8> = row.get(1)?;
        let count: i64 = row.get(2)?;
        return Ok(Some(ArmState::from_blobs(
            &a_blob,
            &b_blob,
            count.max(0) as u64,
        )?));
    }
    Ok(None)
}

/// Write an arm's (A, b, update_count) together.
pub fn upsert_arm(
    conn: &Connection,
    arm_id: &str,
    arm: &ArmState,
    now: DateTime<Utc>,
) -> Result<()> {
    let (a_blob, b_blob) = arm.to_blobs();
    conn.execute(
        "INSERT INTO bandit_state (arm_id, a_matrix, b_vector, update_count, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(arm_id) DO UPDATE SET
            a_matrix=excluded.a_matrix,
            b_vector=excluded.b_vector,
            update_count=excluded.update_count,
            updated_at=excluded.updated_at",
        params![
            arm_id,
            a_blob,
            b_blob,
            arm.update_count() as i64,
            dt_to_sql(&now)
        ],
    )?;
    Ok(())
}

/// Whether a rusqlite error is a unique/constraint violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Whether a rusqlite error is a busy/locked conflict worth retrying.
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

// ============================================================================
// Row mapping
// ============================================================================

fn employee_from_row(row: &rusqlite::Row<'_>) -> Result<Employee> {
    let skills_json: String = row.get(2)?;
    let skills: Vec<SkillProfile> = serde_json::from_str(&skills_json)?;

    let blob: Option<Vec<u8>> = row.get(3)?;
    let dims: Option<i64> = row.get(4)?;
    let skill_embeddings = match (blob, dims) {
        (Some(blob), Some(dims)) if dims > 0 => {
            Some(decode_embeddings_f16(&blob, dims as usize)?)
        }
        _ => None,
    };

    let workload: i64 = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Employee {
        id: row.get(0)?,
        name: row.get(1)?,
        skills,
        skill_embeddings,
        skills_hash: row.get(5)?,
        productivity_score: row.get(6)?,
        workload: workload.max(0) as u32,
        active: row.get(8)?,
        created_at: dt_from_sql(&created_at)?,
        updated_at: dt_from_sql(&updated_at)?,
    })
}

fn task_from_row(row: &rusqlite::Row<'_>) -> Result<Task> {
    let required_json: String = row.get(5)?;
    let required_skills: Vec<String> = serde_json::from_str(&required_json)?;

    let blob: Option<Vec<u8>> = row.get(6)?;
    let dims: Option<i64> = row.get(7)?;
    let skill_embeddings = match (blob, dims) {
        (Some(blob), Some(dims)) if dims > 0 => {
            Some(decode_embeddings_f16(&blob, dims as usize)?)
        }
        _ => None,
    };

    let priority: i64 = row.get(3)?;
    let difficulty: i64 = row.get(4)?;
    let status: String = row.get(9)?;
    let due_date: Option<String> = row.get(12)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        priority: priority.clamp(1, 5) as u8,
        difficulty: difficulty.clamp(1, 10) as u8,
        required_skills,
        skill_embeddings,
        skills_hash: row.get(8)?,
        status: TaskStatus::parse(&status)?,
        creator_id: row.get(10)?,
        assignee_id: row.get(11)?,
        due_date: due_date.as_deref().map(dt_from_sql).transpose()?,
        created_at: dt_from_sql(&created_at)?,
        updated_at: dt_from_sql(&updated_at)?,
    })
}

fn assignment_from_row(row: &rusqlite::Row<'_>) -> Result<Assignment> {
    let context_blob: Vec<u8> = row.get(4)?;
    let rework: i64 = row.get(5)?;
    let assigned_at: String = row.get(6)?;
    let completed_at: Option<String> = row.get(7)?;

    Ok(Assignment {
        id: row.get(0)?,
        task_id: row.get(1)?,
        employee_id: row.get(2)?,
        assigner_id: row.get(3)?,
        context: ContextVector::from_bytes(&context_blob)?,
        rework_count: rework.max(0) as u32,
        assigned_at: dt_from_sql(&assigned_at)?,
        completed_at: completed_at.as_deref().map(dt_from_sql).transpose()?,
    })
}

fn feedback_from_row(row: &rusqlite::Row<'_>) -> Result<Feedback> {
    let overdue: i64 = row.get(11)?;
    let context_blob: Vec<u8> = row.get(12)?;
    let created_at: String = row.get(13)?;

    Ok(Feedback {
        id: row.get(0)?,
        task_id: row.get(1)?,
        employee_id: row.get(2)?,
        components: RewardComponents {
            r_completion: row.get(3)?,
            r_ontime: row.get(4)?,
            r_good_behaviour: row.get(5)?,
            p_overdue: row.get(6)?,
            p_rework: row.get(7)?,
            p_failure: row.get(8)?,
            raw_reward: row.get(9)?,
            reward_value: row.get(10)?,
            overdue_days: overdue.max(0) as u32,
        },
        context: ContextVector::from_bytes(&context_blob)?,
        created_at: dt_from_sql(&created_at)?,
    })
}

// ============================================================================
// Encoding helpers
// ============================================================================

fn configure_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -64000;
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(())
}

fn validate_dims(embeddings: &[Vec<f32>], dims: usize) -> Result<()> {
    if dims == 0 {
        return Err(TmError::InvariantViolated(
            "embedding dims must be positive".to_string(),
        ));
    }
    for vec in embeddings {
        if vec.len() != dims {
            return Err(TmError::InvariantViolated(format!(
                "embedding dims mismatch: expected {dims}, got {}",
                vec.len()
            )));
        }
    }
    Ok(())
}

/// Concatenated f16 little-endian encoding of an embedding list.
fn encode_embeddings_f16(embeddings: &[Vec<f32>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(embeddings.iter().map(|v| v.len() * 2).sum());
    for vec in embeddings {
        for value in vec {
            out.extend_from_slice(&f16::from_f32(*value).to_bits().to_le_bytes());
        }
    }
    out
}

fn decode_embeddings_f16(blob: &[u8], dims: usize) -> Result<Vec<Vec<f32>>> {
    let stride = dims * 2;
    if stride == 0 || blob.len() % stride != 0 {
        return Err(TmError::InvariantViolated(format!(
            "embedding blob length {} does not divide into vectors of dim {dims}",
            blob.len()
        )));
    }
    let mut out = Vec::with_capacity(blob.len() / stride);
    for vec_bytes in blob.chunks_exact(stride) {
        let mut vec = Vec::with_capacity(dims);
        for pair in vec_bytes.chunks_exact(2) {
            let bits = u16::from_le_bytes([pair[0], pair[1]]);
            vec.push(f16::from_bits(bits).to_f32());
        }
        out.push(vec);
    }
    Ok(out)
}

fn dt_to_sql(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn dt_from_sql(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| TmError::InvariantViolated(format!("bad stored timestamp {raw:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn sample_employee(id: &str) -> Employee {
        Employee::new(
            id,
            "Ada",
            vec![SkillProfile::with_months("rust", 24, 12)],
            0.8,
            now(),
        )
    }

    fn sample_task(id: &str) -> Task {
        Task::new(
            id,
            "Ship exporter",
            "CSV export for reports",
            3,
            2,
            vec!["rust".into()],
            "admin",
            Some(now() + Duration::hours(48)),
            now(),
        )
        .unwrap()
    }

    fn sample_context() -> ContextVector {
        ContextVector::new([0.8, 1.0, 0.5, 1.0 / 9.0, 0.3, 1.0 / 3.0, 0.4, 0.2])
    }

    #[test]
    fn employee_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let employee = sample_employee("e1");
        db.insert_employee(&employee).unwrap();

        let loaded = db.get_employee("e1").unwrap().unwrap();
        assert_eq!(loaded.id, "e1");
        assert_eq!(loaded.skills, employee.skills);
        assert!(loaded.skill_embeddings.is_none());
        assert_eq!(loaded.workload, 0);
        assert!(loaded.active);
        assert_eq!(loaded.created_at, employee.created_at);
    }

    #[test]
    fn missing_employee_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_employee("ghost").unwrap().is_none());
    }

    #[test]
    fn embedding_cache_roundtrip_is_f16_close() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();

        let embs = vec![vec![0.6, -0.8, 0.0, 0.125]];
        db.update_employee_embeddings("e1", &embs, 4, "hash-abc", now())
            .unwrap();

        let loaded = db.get_employee("e1").unwrap().unwrap();
        assert_eq!(loaded.skills_hash.as_deref(), Some("hash-abc"));
        let cached = loaded.skill_embeddings.unwrap();
        assert_eq!(cached.len(), 1);
        for (stored, original) in cached[0].iter().zip(embs[0].iter()) {
            assert!((stored - original).abs() < 1e-2);
        }
    }

    #[test]
    fn task_roundtrip_with_due_date() {
        let db = Database::open_in_memory().unwrap();
        let task = sample_task("t1");
        db.insert_task(&task).unwrap();

        let loaded = db.get_task("t1").unwrap().unwrap();
        assert_eq!(loaded.priority, 3);
        assert_eq!(loaded.difficulty, 2);
        assert_eq!(loaded.status, TaskStatus::Todo);
        assert_eq!(loaded.due_date, task.due_date);
        assert_eq!(loaded.required_skills, vec!["rust".to_string()]);
    }

    #[test]
    fn second_open_assignment_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();
        db.insert_employee(&sample_employee("e2")).unwrap();
        db.insert_task(&sample_task("t1")).unwrap();

        let first = Assignment::open("a1", "t1", "e1", "admin", sample_context(), now());
        insert_assignment(db.conn(), &first).unwrap();

        let second = Assignment::open("a2", "t1", "e2", "admin", sample_context(), now());
        let err = insert_assignment(db.conn(), &second).unwrap_err();
        assert!(matches!(err, TmError::AlreadyAssigned(id) if id == "t1"));
    }

    #[test]
    fn closing_assignment_allows_reassignment() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();
        db.insert_task(&sample_task("t1")).unwrap();

        let first = Assignment::open("a1", "t1", "e1", "admin", sample_context(), now());
        insert_assignment(db.conn(), &first).unwrap();
        close_assignment(db.conn(), "a1", now() + Duration::days(1)).unwrap();

        assert!(db.get_open_assignment("t1").unwrap().is_none());

        let again = Assignment::open("a2", "t1", "e1", "admin", sample_context(), now());
        insert_assignment(db.conn(), &again).unwrap();
        let open = db.get_open_assignment("t1").unwrap().unwrap();
        assert_eq!(open.id, "a2");
    }

    #[test]
    fn close_is_not_repeatable() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();
        db.insert_task(&sample_task("t1")).unwrap();

        let a = Assignment::open("a1", "t1", "e1", "admin", sample_context(), now());
        insert_assignment(db.conn(), &a).unwrap();
        close_assignment(db.conn(), "a1", now()).unwrap();
        assert!(close_assignment(db.conn(), "a1", now()).is_err());
    }

    #[test]
    fn context_vector_is_byte_stable() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();
        db.insert_task(&sample_task("t1")).unwrap();

        let ctx = sample_context();
        let a = Assignment::open("a1", "t1", "e1", "admin", ctx.clone(), now());
        insert_assignment(db.conn(), &a).unwrap();

        let loaded = db.get_open_assignment("t1").unwrap().unwrap();
        assert_eq!(loaded.context.to_bytes(), ctx.to_bytes());
    }

    #[test]
    fn duplicate_feedback_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();
        db.insert_task(&sample_task("t1")).unwrap();

        let feedback = Feedback {
            id: "f1".into(),
            task_id: "t1".into(),
            employee_id: "e1".into(),
            components: RewardComponents {
                r_completion: 1.0,
                r_ontime: 0.5,
                r_good_behaviour: 0.2,
                p_overdue: 0.0,
                p_rework: 0.0,
                p_failure: 0.0,
                overdue_days: 0,
                raw_reward: 1.7,
                reward_value: 1.7,
            },
            context: sample_context(),
            created_at: now(),
        };
        insert_feedback(db.conn(), &feedback).unwrap();

        let mut duplicate = feedback.clone();
        duplicate.id = "f2".into();
        let err = insert_feedback(db.conn(), &duplicate).unwrap_err();
        assert!(matches!(err, TmError::AlreadyCompleted(id) if id == "t1"));

        let loaded = db.get_feedback("t1").unwrap().unwrap();
        assert_eq!(loaded.id, "f1");
        assert!((loaded.components.reward_value - 1.7).abs() < 1e-12);
    }

    #[test]
    fn workload_adjustment_floors_at_zero() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();

        assert_eq!(adjust_workload(db.conn(), "e1", 1, now()).unwrap(), 1);
        assert_eq!(adjust_workload(db.conn(), "e1", 1, now()).unwrap(), 2);
        assert_eq!(adjust_workload(db.conn(), "e1", -1, now()).unwrap(), 1);
        assert_eq!(adjust_workload(db.conn(), "e1", -1, now()).unwrap(), 0);
        assert_eq!(adjust_workload(db.conn(), "e1", -1, now()).unwrap(), 0);

        let err = adjust_workload(db.conn(), "ghost", 1, now()).unwrap_err();
        assert!(matches!(err, TmError::UnknownEmployee(_)));
    }

    #[test]
    fn arm_state_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();

        let mut arm = ArmState::cold(1.0);
        arm.observe(&sample_context(), 1.7);
        upsert_arm(db.conn(), "e1", &arm, now()).unwrap();

        let loaded = db.get_arm("e1").unwrap().unwrap();
        assert_eq!(loaded, arm);
        assert_eq!(loaded.update_count(), 1);

        // Upsert replaces in place.
        let mut arm2 = loaded;
        arm2.observe(&sample_context(), -0.2);
        upsert_arm(db.conn(), "e1", &arm2, now()).unwrap();
        let arms = db.list_arms().unwrap();
        assert_eq!(arms, vec![("e1".to_string(), 2)]);
    }

    #[test]
    fn rework_increments_only_open_assignments() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();
        db.insert_task(&sample_task("t1")).unwrap();

        let a = Assignment::open("a1", "t1", "e1", "admin", sample_context(), now());
        insert_assignment(db.conn(), &a).unwrap();

        assert_eq!(increment_rework(db.conn(), "a1").unwrap(), 1);
        assert_eq!(increment_rework(db.conn(), "a1").unwrap(), 2);

        close_assignment(db.conn(), "a1", now()).unwrap();
        assert!(increment_rework(db.conn(), "a1").is_err());
    }

    #[test]
    fn list_employees_filters_active() {
        let db = Database::open_in_memory().unwrap();
        db.insert_employee(&sample_employee("e1")).unwrap();
        let mut inactive = sample_employee("e2");
        inactive.active = false;
        db.insert_employee(&inactive).unwrap();

        assert_eq!(db.list_employees(false).unwrap().len(), 2);
        let active = db.list_employees(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "e1");
    }

    #[test]
    fn list_tasks_by_status() {
        let db = Database::open_in_memory().unwrap();
        db.insert_task(&sample_task("t1")).unwrap();
        db.insert_task(&sample_task("t2")).unwrap();
        set_task_status(db.conn(), "t2", TaskStatus::Done, now()).unwrap();

        assert_eq!(db.list_tasks(None).unwrap().len(), 2);
        let done = db.list_tasks(Some(TaskStatus::Done)).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, "t2");
    }
}
