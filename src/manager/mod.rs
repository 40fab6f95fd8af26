//! Task CRUD and queries within a tag.

pub mod stats;

use crate::collection::TaskCollection;
use crate::config::TaskSettings;
use crate::error::{Error, FieldIssue, Result};
use crate::store::TaskStore;
use crate::types::{NewTask, Task, TaskFilter, TaskMetadata, TaskPatch, TaskSort, TaskStatus};
use serde::{Deserialize, Serialize};
use stats::TaskStats;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Delete even when other tasks depend on the target, stripping the
    /// deleted ids from their dependency lists.
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// The task and every subtask removed with it.
    pub deleted: Vec<String>,
    /// Tasks whose dependency lists were cleaned up.
    pub updated_dependents: Vec<String>,
}

/// CRUD over the tasks of a tag.
#[derive(Debug, Clone)]
pub struct TaskManager {
    store: TaskStore,
    settings: TaskSettings,
}

impl TaskManager {
    pub fn new(store: TaskStore, settings: TaskSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn create_task(&self, tag: &str, data: NewTask) -> Result<Task> {
        check_new_task(&data)?;
        self.store.with_tag_mut(tag, |collection| {
            check_references(collection, &data.dependencies)?;
            let id = collection.next_task_id();
            let task = self.build_task(id, data, None);
            collection.tasks.push(task.clone());
            info!(id = %task.id, tag, title = %task.title, "Created task");
            Ok(task)
        })
    }

    pub fn create_subtask(&self, parent_id: &str, data: NewTask, tag: &str) -> Result<Task> {
        check_new_task(&data)?;
        self.store.with_tag_mut(tag, |collection| {
            let parent = collection.require(parent_id, tag)?;
            let id = collection.next_subtask_id(parent);
            check_references(collection, &data.dependencies)?;
            let task = self.build_task(id, data, Some(parent_id));

            let parent = collection.require_mut(parent_id, tag)?;
            parent.subtasks.push(task.clone());
            parent.metadata.touch();
            info!(id = %task.id, parent_id, tag, "Created subtask");
            Ok(task)
        })
    }

    fn build_task(&self, id: String, data: NewTask, parent_id: Option<&str>) -> Task {
        Task {
            id,
            title: data.title.trim().to_string(),
            description: data.description.unwrap_or_default(),
            details: data.details.unwrap_or_default(),
            test_strategy: data.test_strategy,
            status: data.status.unwrap_or_default(),
            priority: data.priority.unwrap_or(self.settings.default_priority),
            task_type: data.task_type,
            assignee: data.assignee,
            tags: data.tags,
            estimated_hours: data.estimated_hours,
            actual_hours: None,
            due_date: data.due_date,
            dependencies: data.dependencies,
            parent_id: parent_id.map(str::to_string),
            subtasks: Vec::new(),
            metadata: TaskMetadata::created_now(),
        }
    }

    pub fn get_task(&self, id: &str, tag: &str) -> Result<Task> {
        self.store
            .with_tag(tag, |collection| collection.require(id, tag).cloned())
    }

    pub fn update_task(&self, id: &str, patch: TaskPatch, tag: &str) -> Result<Task> {
        let mut issues = Vec::new();
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            issues.push(FieldIssue::new("title", "title must not be empty"));
        }
        check_hours("estimatedHours", patch.estimated_hours.flatten(), &mut issues);
        check_hours("actualHours", patch.actual_hours.flatten(), &mut issues);
        if !issues.is_empty() {
            return Err(Error::Validation { issues });
        }

        self.store.with_tag_mut(tag, |collection| {
            let task = collection.require_mut(id, tag)?;
            if let Some(status) = patch.status {
                self.check_transition(task, status)?;
            }

            let TaskPatch {
                title,
                description,
                details,
                test_strategy,
                status,
                priority,
                task_type,
                assignee,
                tags,
                estimated_hours,
                actual_hours,
                due_date,
            } = patch;

            if let Some(title) = title {
                task.title = title.trim().to_string();
            }
            if let Some(description) = description {
                task.description = description;
            }
            if let Some(details) = details {
                task.details = details;
            }
            if let Some(test_strategy) = test_strategy {
                task.test_strategy = test_strategy;
            }
            if let Some(status) = status {
                task.status = status;
            }
            if let Some(priority) = priority {
                task.priority = priority;
            }
            if let Some(task_type) = task_type {
                task.task_type = task_type;
            }
            if let Some(assignee) = assignee {
                task.assignee = assignee;
            }
            if let Some(tags) = tags {
                task.tags = tags;
            }
            if let Some(estimated_hours) = estimated_hours {
                task.estimated_hours = estimated_hours;
            }
            if let Some(actual_hours) = actual_hours {
                task.actual_hours = actual_hours;
            }
            if let Some(due_date) = due_date {
                task.due_date = due_date;
            }
            task.metadata.touch();

            info!(id, tag, "Updated task");
            Ok(task.clone())
        })
    }

    pub fn update_task_status(&self, id: &str, status: TaskStatus, tag: &str) -> Result<Task> {
        self.store.with_tag_mut(tag, |collection| {
            let task = collection.require_mut(id, tag)?;
            self.check_transition(task, status)?;
            if task.status != status {
                let from = task.status;
                task.status = status;
                task.metadata.touch();
                info!(id, tag, %from, to = %status, "Changed task status");
            }
            Ok(task.clone())
        })
    }

    fn check_transition(&self, task: &Task, next: TaskStatus) -> Result<()> {
        if task.status.can_transition_to(next) {
            return Ok(());
        }
        if self.settings.strict_transitions {
            return Err(Error::validation(
                "status",
                format!("cannot move task {} from {} to {}", task.id, task.status, next),
            ));
        }
        warn!(id = %task.id, from = %task.status, to = %next, "Unconventional status transition");
        Ok(())
    }

    /// Delete a task and its subtasks.
    ///
    /// Refuses with `DependentsExist` while tasks outside the deleted subtree
    /// still depend on it, unless `options.force` is set.
    pub fn delete_task(&self, id: &str, tag: &str, options: DeleteOptions) -> Result<DeleteOutcome> {
        self.store.with_tag_mut(tag, |collection| {
            let mut subtree: Vec<String> = Vec::new();
            let mut stack = vec![collection.require(id, tag)?];
            while let Some(t) = stack.pop() {
                subtree.push(t.id.clone());
                stack.extend(t.subtasks.iter().rev());
            }
            let doomed: HashSet<&str> = subtree.iter().map(String::as_str).collect();

            let dependents: Vec<String> = collection
                .iter_all()
                .into_iter()
                .filter(|t| !doomed.contains(t.id.as_str()))
                .filter(|t| t.dependencies.iter().any(|d| doomed.contains(d.as_str())))
                .map(|t| t.id.clone())
                .collect();

            if !dependents.is_empty() && !options.force {
                return Err(Error::DependentsExist {
                    id: id.to_string(),
                    dependents,
                });
            }

            collection.remove(id);
            collection.for_each_mut(|t| {
                let before = t.dependencies.len();
                t.dependencies.retain(|d| !doomed.contains(d.as_str()));
                if t.dependencies.len() != before {
                    t.metadata.touch();
                }
            });

            info!(id, tag, removed = subtree.len(), cleaned = dependents.len(), "Deleted task");
            Ok(DeleteOutcome {
                deleted: subtree,
                updated_dependents: dependents,
            })
        })
    }

    /// Matching tasks in insertion order, or in `filter.sort` order. Sorting
    /// is stable, so equal keys keep insertion order.
    pub fn list_tasks(&self, filter: &TaskFilter, tag: &str) -> Result<Vec<Task>> {
        self.store.with_tag(tag, |collection| {
            let candidates: Vec<&Task> = if filter.include_subtasks {
                collection.iter_all()
            } else {
                collection.tasks.iter().collect()
            };
            let mut tasks: Vec<Task> = candidates
                .into_iter()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect();

            match filter.sort {
                None => {}
                Some(TaskSort::Priority) => tasks.sort_by_key(|t| Reverse(t.priority)),
                Some(TaskSort::Status) => tasks.sort_by_key(|t| t.status),
                Some(TaskSort::Title) => tasks.sort_by_key(|t| t.title.to_lowercase()),
                Some(TaskSort::DueDate) => tasks.sort_by_key(|t| (t.due_date.is_none(), t.due_date)),
            }
            Ok(tasks)
        })
    }

    /// The task to work on next: pending or in progress, with every
    /// dependency done. Subtasks of in-progress parents come first; then
    /// higher priority, fewer dependencies, and earlier position win.
    pub fn next_task(&self, tag: &str) -> Result<Option<Task>> {
        self.store.with_tag(tag, |collection| Ok(pick_next(collection).cloned()))
    }

    pub fn get_stats(&self, tag: &str) -> Result<TaskStats> {
        self.store
            .with_tag(tag, |collection| Ok(stats::compute_stats(collection, chrono::Utc::now())))
    }
}

fn pick_next(collection: &TaskCollection) -> Option<&Task> {
    let done: HashSet<&str> = collection
        .iter_all()
        .into_iter()
        .filter(|t| t.status == TaskStatus::Done)
        .map(|t| t.id.as_str())
        .collect();
    let eligible = |t: &Task| {
        matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress)
            && t.dependencies.iter().all(|d| done.contains(d.as_str()))
    };
    let rank = |(pos, t): &(usize, &Task)| (Reverse(t.priority), t.dependencies.len(), *pos);

    let subtasks = collection
        .tasks
        .iter()
        .filter(|p| p.status == TaskStatus::InProgress)
        .flat_map(|p| p.subtasks.iter())
        .filter(|&t| eligible(t))
        .enumerate()
        .min_by_key(rank);
    if let Some((_, task)) = subtasks {
        return Some(task);
    }

    collection
        .tasks
        .iter()
        .filter(|&t| eligible(t))
        .enumerate()
        .min_by_key(rank)
        .map(|(_, t)| t)
}

fn check_hours(field: &str, hours: Option<f64>, issues: &mut Vec<FieldIssue>) {
    if let Some(h) = hours
        && !(h.is_finite() && h >= 0.0)
    {
        issues.push(FieldIssue::new(field, "must be a non-negative number"));
    }
}

fn check_new_task(data: &NewTask) -> Result<()> {
    let mut issues = Vec::new();
    if data.title.trim().is_empty() {
        issues.push(FieldIssue::new("title", "title is required"));
    }
    check_hours("estimatedHours", data.estimated_hours, &mut issues);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { issues })
    }
}

fn check_references(collection: &TaskCollection, dependencies: &[String]) -> Result<()> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    for (i, dep) in dependencies.iter().enumerate() {
        if !collection.contains(dep) {
            issues.push(FieldIssue::new(
                format!("dependencies[{}]", i),
                format!("unknown task id '{}'", dep),
            ));
        } else if !seen.insert(dep.as_str()) {
            issues.push(FieldIssue::new(
                format!("dependencies[{}]", i),
                format!("duplicate dependency '{}'", dep),
            ));
        }
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn c(tasks: Vec<Task>) -> TaskCollection {
        TaskCollection::from_tasks(tasks)
    }

    #[test]
    fn next_prefers_priority_then_fewer_dependencies() {
        let collection = c(vec![
            Task::new("1", "done").with_status(TaskStatus::Done),
            Task::new("2", "blocked").with_dependencies(["3"]).with_priority(Priority::Critical),
            Task::new("3", "low").with_priority(Priority::Low),
            Task::new("4", "high, one dep").with_dependencies(["1"]).with_priority(Priority::High),
            Task::new("5", "high, none").with_priority(Priority::High),
        ]);
        assert_eq!(pick_next(&collection).unwrap().id, "5");
    }

    #[test]
    fn next_descends_into_in_progress_parent() {
        let mut parent = Task::new("1", "parent").with_status(TaskStatus::InProgress);
        let mut sub = Task::new("1.1", "child");
        sub.parent_id = Some("1".into());
        parent.subtasks.push(sub);
        let collection = c(vec![parent, Task::new("2", "urgent").with_priority(Priority::Critical)]);
        assert_eq!(pick_next(&collection).unwrap().id, "1.1");
    }

    #[test]
    fn next_is_none_when_everything_is_blocked_or_finished() {
        let collection = c(vec![
            Task::new("1", "a").with_status(TaskStatus::Done),
            Task::new("2", "b").with_status(TaskStatus::Blocked),
            Task::new("3", "c").with_dependencies(["2"]),
        ]);
        assert!(pick_next(&collection).is_none());
    }

    #[test]
    fn hours_must_be_non_negative() {
        let mut issues = Vec::new();
        check_hours("estimatedHours", Some(-1.0), &mut issues);
        check_hours("actualHours", Some(f64::NAN), &mut issues);
        check_hours("actualHours", Some(2.5), &mut issues);
        assert_eq!(issues.len(), 2);
    }
}
