//! Error handling for TaskMatch.
//!
//! This module provides:
//! - [`TmError`]: The main error enum for all tm operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type for robot mode output

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod codes;

pub use codes::ErrorCode;

/// Main error type for TaskMatch operations.
#[derive(Error, Debug)]
pub enum TmError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Employee not found: {0}")]
    UnknownEmployee(String),

    #[error("Invalid manual assignment target: {0}")]
    InvalidManualTarget(String),

    #[error("Task already has an open assignment: {0}")]
    AlreadyAssigned(String),

    #[error("Task already completed: {0}")]
    AlreadyCompleted(String),

    #[error("Task has no open assignment: {0}")]
    NotAssigned(String),

    #[error("No active employees available for assignment")]
    NoCandidates,

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TmError {
    /// Get the error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::UnknownTask(_) => ErrorCode::TaskNotFound,
            Self::UnknownEmployee(_) => ErrorCode::EmployeeNotFound,
            Self::InvalidManualTarget(_) => ErrorCode::InvalidManualTarget,
            Self::AlreadyAssigned(_) => ErrorCode::TaskAlreadyAssigned,
            Self::AlreadyCompleted(_) => ErrorCode::TaskAlreadyCompleted,
            Self::NotAssigned(_) => ErrorCode::TaskNotAssigned,
            Self::NoCandidates => ErrorCode::NoCandidates,
            Self::InvalidTask(_) => ErrorCode::TaskInvalid,
            Self::Embedding(_) => ErrorCode::EmbeddingUnavailable,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
            Self::InvariantViolated(_) => ErrorCode::InvariantViolated,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::UnknownTask(id)
            | Self::AlreadyAssigned(id)
            | Self::AlreadyCompleted(id)
            | Self::NotAssigned(id) => Some(serde_json::json!({ "task_id": id })),
            Self::UnknownEmployee(id) | Self::InvalidManualTarget(id) => {
                Some(serde_json::json!({ "employee_id": id }))
            }
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_tm_error(self)
    }
}

/// A structured error with machine-readable code and context.
///
/// This type is designed for robot mode output where callers need
/// to parse errors and take appropriate action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "TASK_NOT_FOUND")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 101)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the caller
    pub recoverable: bool,

    /// Error category (e.g., "task", "employee", "storage")
    pub category: String,
}

impl StructuredError {
    /// Create a structured error from a [`TmError`].
    #[must_use]
    pub fn from_tm_error(err: &TmError) -> Self {
        let code = err.code();
        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            context: err.context(),
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<TmError> for StructuredError {
    fn from(err: TmError) -> Self {
        Self::from_tm_error(&err)
    }
}

/// Result type alias using TmError.
pub type Result<T> = std::result::Result<T, TmError>;
