//! In-memory contents of one tag.
//!
//! Tasks keep their insertion order; subtasks live inside their parent.
//! Lookups walk the tree with an explicit stack, so nesting depth never
//! grows the call stack.

use crate::error::{Error, FieldIssue, Result};
use crate::types::Task;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Optional descriptive data attached to a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// All tasks of a single tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCollection {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TagMetadata>,
}

impl TaskCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            metadata: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Every task and subtask in pre-order (parent before its subtasks).
    pub fn iter_all(&self) -> Vec<&Task> {
        let mut out = Vec::new();
        let mut stack: Vec<&Task> = self.tasks.iter().rev().collect();
        while let Some(task) = stack.pop() {
            out.push(task);
            stack.extend(task.subtasks.iter().rev());
        }
        out
    }

    /// Index path from the top-level list down to `id`.
    fn locate(&self, id: &str) -> Option<Vec<usize>> {
        let mut stack: Vec<(Vec<usize>, &Task)> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (vec![i], t))
            .collect();
        while let Some((path, task)) = stack.pop() {
            if task.id == id {
                return Some(path);
            }
            for (i, sub) in task.subtasks.iter().enumerate() {
                let mut child = path.clone();
                child.push(i);
                stack.push((child, sub));
            }
        }
        None
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        let path = self.locate(id)?;
        let (first, rest) = path.split_first()?;
        let mut task = &self.tasks[*first];
        for i in rest {
            task = &task.subtasks[*i];
        }
        Some(task)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Task> {
        let path = self.locate(id)?;
        let (first, rest) = path.split_first()?;
        let mut task = &mut self.tasks[*first];
        for i in rest {
            task = &mut task.subtasks[*i];
        }
        Some(task)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    /// Like [`find`](Self::find) but reports a missing id as `TaskNotFound`.
    pub fn require(&self, id: &str, tag: &str) -> Result<&Task> {
        self.find(id).ok_or_else(|| Error::task_not_found(id, tag))
    }

    pub fn require_mut(&mut self, id: &str, tag: &str) -> Result<&mut Task> {
        self.find_mut(id).ok_or_else(|| Error::task_not_found(id, tag))
    }

    /// Detach a task (with its subtasks) from wherever it lives.
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let mut path = self.locate(id)?;
        let last = path.pop()?;
        if path.is_empty() {
            return Some(self.tasks.remove(last));
        }
        let (first, rest) = path.split_first()?;
        let mut parent = &mut self.tasks[*first];
        for i in rest {
            parent = &mut parent.subtasks[*i];
        }
        Some(parent.subtasks.remove(last))
    }

    /// Apply `f` to every task and subtask.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Task)) {
        let mut stack: Vec<&mut Task> = self.tasks.iter_mut().collect();
        while let Some(task) = stack.pop() {
            f(task);
            stack.extend(task.subtasks.iter_mut());
        }
    }

    /// Ids of all tasks whose dependency list names `id`.
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        self.iter_all()
            .into_iter()
            .filter(|t| t.dependencies.iter().any(|d| d == id))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Next free top-level id: one past the largest numeric id.
    pub fn next_task_id(&self) -> String {
        let max = self
            .tasks
            .iter()
            .filter_map(|t| t.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        free_number(max, |n| self.contains(&n.to_string())).to_string()
    }

    /// Next dotted id under `parent`, e.g. `3.2`.
    pub fn next_subtask_id(&self, parent: &Task) -> String {
        let prefix = format!("{}.", parent.id);
        let max = parent
            .subtasks
            .iter()
            .filter_map(|s| s.id.strip_prefix(&prefix))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let n = free_number(max, |n| self.contains(&format!("{}{}", prefix, n)));
        format!("{}{}", prefix, n)
    }

    /// Structural checks run on every load.
    ///
    /// Rejects duplicate ids, blank titles, and subtasks whose parent
    /// reference or id prefix disagrees with the task that owns them.
    /// Dangling dependency ids are not structural; dependency validation
    /// reports those.
    pub fn validate_shape(&self) -> Result<()> {
        let mut issues = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        let mut stack: Vec<(String, &Task, Option<&Task>)> = self
            .tasks
            .iter()
            .enumerate()
            .rev()
            .map(|(i, t)| (format!("tasks[{}]", i), t, None))
            .collect();

        while let Some((path, task, parent)) = stack.pop() {
            if task.id.trim().is_empty() {
                issues.push(FieldIssue::new(format!("{}.id", path), "id must not be empty"));
            } else if !seen.insert(task.id.as_str()) {
                issues.push(FieldIssue::new(
                    format!("{}.id", path),
                    format!("duplicate id '{}'", task.id),
                ));
            }
            if task.title.trim().is_empty() {
                issues.push(FieldIssue::new(
                    format!("{}.title", path),
                    "title must not be empty",
                ));
            }

            match parent {
                Some(parent) => {
                    if task.parent_id.as_deref() != Some(parent.id.as_str()) {
                        issues.push(FieldIssue::new(
                            format!("{}.parentId", path),
                            format!("expected parent '{}'", parent.id),
                        ));
                    }
                    if !task.id.starts_with(&format!("{}.", parent.id)) {
                        issues.push(FieldIssue::new(
                            format!("{}.id", path),
                            format!("subtask id must start with '{}.'", parent.id),
                        ));
                    }
                }
                None => {
                    if task.parent_id.is_some() {
                        issues.push(FieldIssue::new(
                            format!("{}.parentId", path),
                            "top-level task must not have a parent",
                        ));
                    }
                }
            }

            for (i, sub) in task.subtasks.iter().enumerate().rev() {
                stack.push((format!("{}.subtasks[{}]", path, i), sub, Some(task)));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { issues })
        }
    }
}

/// First untaken number after `max`, or the lowest free one once `max` is
/// already `u64::MAX`.
fn free_number(max: u64, taken: impl Fn(u64) -> bool) -> u64 {
    let mut candidate = max.checked_add(1);
    while let Some(n) = candidate {
        if !taken(n) {
            return n;
        }
        candidate = n.checked_add(1);
    }
    (1..=u64::MAX).find(|&n| !taken(n)).unwrap_or(0)
}
