//! Durable storage: SQLite schema, typed row access, busy retry.

pub mod migrations;
pub mod sqlite;

use std::time::Duration;

use tracing::warn;

pub use sqlite::Database;

use crate::error::{Result, TmError};

/// Backoff schedule for transient storage conflicts.
const BACKOFF_MS: [u64; 3] = [10, 40, 160];

/// Run a storage operation, retrying busy/locked conflicts with
/// exponential backoff. Anything else surfaces immediately.
pub fn with_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(TmError::Database(err)) if sqlite::is_busy(&err) && attempt < BACKOFF_MS.len() => {
                warn!(attempt, "database busy, backing off before retry");
                std::thread::sleep(Duration::from_millis(BACKOFF_MS[attempt]));
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_busy_errors_surface_immediately() {
        let mut calls = 0;
        let result: Result<()> = with_retry(|| {
            calls += 1;
            Err(TmError::UnknownTask("t1".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn success_passes_through() {
        let result = with_retry(|| Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn busy_errors_are_retried_then_surfaced() {
        let mut calls = 0;
        let result: Result<()> = with_retry(|| {
            calls += 1;
            Err(TmError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                Some("database is locked".to_string()),
            )))
        });
        assert!(result.is_err());
        // Initial call plus three backoff retries.
        assert_eq!(calls, 4);
    }
}
