//! Structured error types for engine operations.
//!
//! Errors carry data, not presentation. Callers render them however they like;
//! [`ErrorReport`] is the serializable form handed to programmatic consumers.

use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::path::PathBuf;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    CircularDependency,
    DependentsExist,
    StorageError,
    LockTimeout,
}

/// A single invalid or missing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Underlying cause of a storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageCause {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors produced by the task engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {}", join_issues(.issues))]
    Validation { issues: Vec<FieldIssue> },

    #[error("task not found: {id} (tag '{tag}')")]
    TaskNotFound { id: String, tag: String },

    #[error("circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("task {id} has dependents: {}", .dependents.join(", "))]
    DependentsExist { id: String, dependents: Vec<String> },

    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: StorageCause,
    },

    #[error("timed out waiting for lock on {}", .path.display())]
    LockTimeout { path: PathBuf },
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            issues: vec![FieldIssue::new(field, reason)],
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::validation(field, format!("{} is required", field))
    }

    pub fn task_not_found(id: &str, tag: &str) -> Self {
        Error::TaskNotFound {
            id: id.to_string(),
            tag: tag.to_string(),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, source: impl Into<StorageCause>) -> Self {
        Error::Storage {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation { .. } => ErrorCode::ValidationError,
            Error::TaskNotFound { .. } => ErrorCode::NotFound,
            Error::CircularDependency { .. } => ErrorCode::CircularDependency,
            Error::DependentsExist { .. } => ErrorCode::DependentsExist,
            Error::Storage { .. } => ErrorCode::StorageError,
            Error::LockTimeout { .. } => ErrorCode::LockTimeout,
        }
    }

    /// Structured payload for this error kind, if it has one.
    pub fn details(&self) -> Option<Value> {
        match self {
            Error::Validation { issues } => Some(json!({ "issues": issues })),
            Error::TaskNotFound { id, tag } => Some(json!({ "id": id, "tag": tag })),
            Error::CircularDependency { cycle } => Some(json!({ "cycle": cycle })),
            Error::DependentsExist { id, dependents } => {
                Some(json!({ "id": id, "dependents": dependents }))
            }
            Error::Storage { path, .. } | Error::LockTimeout { path } => {
                Some(json!({ "path": path.display().to_string() }))
            }
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

/// Serializable error for programmatic consumers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
