//! Aggregate counts for a tag.

use crate::collection::TaskCollection;
use crate::types::{Priority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Counts over top-level tasks; subtasks are tallied separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total_tasks: usize,
    pub total_subtasks: usize,
    pub completed_tasks: usize,
    pub completed_subtasks: usize,
    /// Every status appears, with zero when unused.
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    /// Keyed by `type`; tasks without one count as `unspecified`.
    pub by_type: BTreeMap<String, usize>,
    /// Tasks and subtasks past their due date and not done.
    pub overdue: usize,
    pub completion_percentage: f64,
    /// Pending tasks whose dependencies are all done.
    pub ready: usize,
    /// Pending tasks waiting on at least one unfinished dependency.
    pub blocked_by_dependencies: usize,
}

pub fn compute_stats(collection: &TaskCollection, now: DateTime<Utc>) -> TaskStats {
    let mut stats = TaskStats {
        by_status: TaskStatus::ALL.iter().map(|s| (*s, 0)).collect(),
        by_priority: Priority::ALL.iter().map(|p| (*p, 0)).collect(),
        ..TaskStats::default()
    };

    let all = collection.iter_all();
    let done: HashSet<&str> = all
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .map(|t| t.id.as_str())
        .collect();

    for task in &collection.tasks {
        stats.total_tasks += 1;
        *stats.by_status.entry(task.status).or_default() += 1;
        *stats.by_priority.entry(task.priority).or_default() += 1;
        let ty = task.task_type.clone().unwrap_or_else(|| "unspecified".to_string());
        *stats.by_type.entry(ty).or_default() += 1;

        if task.status == TaskStatus::Done {
            stats.completed_tasks += 1;
        }
        if task.status == TaskStatus::Pending {
            if task.dependencies.iter().all(|d| done.contains(d.as_str())) {
                stats.ready += 1;
            } else {
                stats.blocked_by_dependencies += 1;
            }
        }

        stats.total_subtasks += task.subtasks.len();
        stats.completed_subtasks += task
            .subtasks
            .iter()
            .filter(|s| s.status == TaskStatus::Done)
            .count();
    }

    stats.overdue = all.iter().filter(|t| t.is_overdue(now)).count();
    if stats.total_tasks > 0 {
        stats.completion_percentage =
            (stats.completed_tasks as f64 / stats.total_tasks as f64 * 1000.0).round() / 10.0;
    }
    stats
}
