//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Task errors
//! - 2xx: Employee / candidate errors
//! - 3xx: Config errors
//! - 5xx: Embedding provider errors
//! - 6xx: Storage errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `TaskNotFound` -> E101).
/// Codes are grouped by category for easy identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Task errors (1xx)
    // ========================================
    /// E101: Requested task does not exist
    TaskNotFound,
    /// E102: Task already has an open assignment
    TaskAlreadyAssigned,
    /// E103: Task is already completed and has feedback
    TaskAlreadyCompleted,
    /// E104: Task has no open assignment to operate on
    TaskNotAssigned,
    /// E105: Task field out of range (priority, difficulty)
    TaskInvalid,

    // ========================================
    // Employee / candidate errors (2xx)
    // ========================================
    /// E201: Requested employee does not exist
    EmployeeNotFound,
    /// E202: Manual assignment target is not an active employee
    InvalidManualTarget,
    /// E203: No active employees available for auto-assignment
    NoCandidates,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file has invalid syntax or values
    ConfigInvalid,
    /// E302: Required config value is missing
    ConfigMissingRequired,

    // ========================================
    // Embedding provider errors (5xx)
    // ========================================
    /// E501: Embedding provider request failed or timed out
    EmbeddingUnavailable,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E601: Database operation failed
    DatabaseError,
    /// E602: Serialization/deserialization failed
    SerializationError,
    /// E603: Failed to read or write a file
    IoError,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: A stored-state invariant was violated (bug)
    InvariantViolated,
    /// E999: Unclassified internal error
    Internal,
}

impl ErrorCode {
    /// Numeric code for this error (e.g., 101 for `TaskNotFound`).
    #[must_use]
    pub const fn numeric(self) -> u16 {
        match self {
            Self::TaskNotFound => 101,
            Self::TaskAlreadyAssigned => 102,
            Self::TaskAlreadyCompleted => 103,
            Self::TaskNotAssigned => 104,
            Self::TaskInvalid => 105,
            Self::EmployeeNotFound => 201,
            Self::InvalidManualTarget => 202,
            Self::NoCandidates => 203,
            Self::ConfigInvalid => 301,
            Self::ConfigMissingRequired => 302,
            Self::EmbeddingUnavailable => 501,
            Self::DatabaseError => 601,
            Self::SerializationError => 602,
            Self::IoError => 603,
            Self::InvariantViolated => 901,
            Self::Internal => 999,
        }
    }

    /// Category name for grouping in output.
    #[must_use]
    pub const fn category(self) -> &'static str {
        match self {
            Self::TaskNotFound
            | Self::TaskAlreadyAssigned
            | Self::TaskAlreadyCompleted
            | Self::TaskNotAssigned
            | Self::TaskInvalid => "task",
            Self::EmployeeNotFound | Self::InvalidManualTarget | Self::NoCandidates => "employee",
            Self::ConfigInvalid | Self::ConfigMissingRequired => "config",
            Self::EmbeddingUnavailable => "embedding",
            Self::DatabaseError | Self::SerializationError | Self::IoError => "storage",
            Self::InvariantViolated | Self::Internal => "internal",
        }
    }

    /// Whether the caller can plausibly recover by changing their request.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        !matches!(
            self,
            Self::DatabaseError
                | Self::SerializationError
                | Self::IoError
                | Self::InvariantViolated
                | Self::Internal
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.numeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_codes_are_unique() {
        let all = [
            ErrorCode::TaskNotFound,
            ErrorCode::TaskAlreadyAssigned,
            ErrorCode::TaskAlreadyCompleted,
            ErrorCode::TaskNotAssigned,
            ErrorCode::TaskInvalid,
            ErrorCode::EmployeeNotFound,
            ErrorCode::InvalidManualTarget,
            ErrorCode::NoCandidates,
            ErrorCode::ConfigInvalid,
            ErrorCode::ConfigMissingRequired,
            ErrorCode::EmbeddingUnavailable,
            ErrorCode::DatabaseError,
            ErrorCode::SerializationError,
            ErrorCode::IoError,
            ErrorCode::InvariantViolated,
            ErrorCode::Internal,
        ];
        let mut codes: Vec<u16> = all.iter().map(|c| c.numeric()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn display_uses_e_prefix() {
        assert_eq!(ErrorCode::TaskNotFound.to_string(), "E101");
        assert_eq!(ErrorCode::Internal.to_string(), "E999");
    }

    #[test]
    fn input_errors_are_recoverable() {
        assert!(ErrorCode::TaskAlreadyAssigned.is_recoverable());
        assert!(ErrorCode::NoCandidates.is_recoverable());
        assert!(!ErrorCode::InvariantViolated.is_recoverable());
        assert!(!ErrorCode::DatabaseError.is_recoverable());
    }

    #[test]
    fn serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::TaskNotFound).unwrap();
        assert_eq!(json, "\"TASK_NOT_FOUND\"");
    }
}
