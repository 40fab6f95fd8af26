//! Arguments for task CRUD and listing subcommands.

use crate::types::{NewTask, Priority, TaskFilter, TaskPatch, TaskSort, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, ValueEnum};

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_due_date(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD or RFC 3339", s))
}

/// Arguments shared by `add` and `add-subtask`
#[derive(Args, Debug)]
pub struct AddArgs {
    pub title: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Implementation notes
    #[arg(long)]
    pub details: Option<String>,

    #[arg(long)]
    pub test_strategy: Option<String>,

    #[arg(short, long)]
    pub priority: Option<Priority>,

    #[arg(short, long)]
    pub status: Option<TaskStatus>,

    /// Free-form task type (feature, bug, chore, ...)
    #[arg(long = "type", value_name = "TYPE")]
    pub task_type: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    /// Comma-separated labels
    #[arg(long = "label", value_name = "LIST", value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Estimated effort in hours
    #[arg(long, value_name = "HOURS")]
    pub estimate: Option<f64>,

    #[arg(long, value_name = "DATE", value_parser = parse_due_date)]
    pub due: Option<DateTime<Utc>>,

    /// Comma-separated ids this task depends on
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub depends_on: Vec<String>,
}

impl AddArgs {
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            title: self.title,
            description: self.description,
            details: self.details,
            test_strategy: self.test_strategy,
            status: self.status,
            priority: self.priority,
            task_type: self.task_type,
            assignee: self.assignee,
            tags: self.labels,
            estimated_hours: self.estimate,
            due_date: self.due,
            dependencies: self.depends_on,
        }
    }
}

/// Optional task fields `update --clear` can unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClearField {
    TestStrategy,
    Type,
    Assignee,
    Estimate,
    Actual,
    Due,
}

/// Arguments for `update`. Only the given fields change.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub details: Option<String>,

    #[arg(long)]
    pub test_strategy: Option<String>,

    #[arg(short, long)]
    pub priority: Option<Priority>,

    #[arg(short, long)]
    pub status: Option<TaskStatus>,

    #[arg(long = "type", value_name = "TYPE")]
    pub task_type: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    /// Replace labels with this comma-separated list
    #[arg(long = "label", value_name = "LIST", value_delimiter = ',')]
    pub labels: Option<Vec<String>>,

    #[arg(long, value_name = "HOURS")]
    pub estimate: Option<f64>,

    /// Hours actually spent
    #[arg(long, value_name = "HOURS")]
    pub actual: Option<f64>,

    #[arg(long, value_name = "DATE", value_parser = parse_due_date)]
    pub due: Option<DateTime<Utc>>,

    /// Unset optional fields (comma-separated)
    #[arg(long, value_name = "FIELDS", value_delimiter = ',')]
    pub clear: Vec<ClearField>,
}

impl UpdateArgs {
    pub fn into_patch(self) -> (String, TaskPatch) {
        let clear = self.clear;
        let patch = TaskPatch {
            title: self.title,
            description: self.description,
            details: self.details,
            test_strategy: clear_or(&clear, ClearField::TestStrategy, self.test_strategy),
            status: self.status,
            priority: self.priority,
            task_type: clear_or(&clear, ClearField::Type, self.task_type),
            assignee: clear_or(&clear, ClearField::Assignee, self.assignee),
            tags: self.labels,
            estimated_hours: clear_or(&clear, ClearField::Estimate, self.estimate),
            actual_hours: clear_or(&clear, ClearField::Actual, self.actual),
            due_date: clear_or(&clear, ClearField::Due, self.due),
        };
        (self.id, patch)
    }
}

/// `Some(None)` when the field is being cleared, otherwise the given value.
fn clear_or<T>(clear: &[ClearField], field: ClearField, value: Option<T>) -> Option<Option<T>> {
    if clear.contains(&field) {
        Some(None)
    } else {
        value.map(Some)
    }
}

/// Arguments for `list`
#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(short, long)]
    pub status: Option<TaskStatus>,

    #[arg(short, long)]
    pub priority: Option<Priority>,

    #[arg(long = "type", value_name = "TYPE")]
    pub task_type: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    #[arg(long)]
    pub label: Option<String>,

    /// Case-insensitive text search over title, description, and details
    #[arg(long)]
    pub search: Option<String>,

    /// priority, status, title, or due-date
    #[arg(long)]
    pub sort: Option<TaskSort>,

    /// Include matching subtasks in the listing
    #[arg(long)]
    pub with_subtasks: bool,
}

impl ListArgs {
    pub fn into_filter(self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            task_type: self.task_type,
            assignee: self.assignee,
            label: self.label,
            search: self.search,
            include_subtasks: self.with_subtasks,
            sort: self.sort,
        }
    }
}
