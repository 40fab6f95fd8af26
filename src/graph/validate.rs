//! Whole-tag dependency validation.

use super::DependencyGraph;
use crate::collection::TaskCollection;
use crate::config::AnalysisConfig;
use crate::types::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// The referenced id does not resolve to a task in the tag.
    Missing,
    SelfReference,
    Duplicate,
}

/// A dependency entry that breaks a graph invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyIssue {
    pub task_id: String,
    pub dependency_id: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    ManyDependencies,
    CancelledDependency,
    DoneWithOpenDependencies,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationWarning {
    pub task_id: String,
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// No errors and no cycles. Warnings do not affect validity.
    pub valid: bool,
    pub errors: Vec<DependencyIssue>,
    pub warnings: Vec<ValidationWarning>,
    pub cycles: Vec<Vec<String>>,
}

/// Scan every task and subtask of a collection.
pub fn validate(collection: &TaskCollection, config: &AnalysisConfig) -> ValidationReport {
    let graph = DependencyGraph::from_collection(collection);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for task in collection.iter_all() {
        let mut seen: HashSet<&str> = HashSet::new();
        for dep in &task.dependencies {
            let kind = if dep == &task.id {
                Some(IssueKind::SelfReference)
            } else if !seen.insert(dep.as_str()) {
                Some(IssueKind::Duplicate)
            } else if !graph.contains(dep) {
                Some(IssueKind::Missing)
            } else {
                None
            };
            if let Some(kind) = kind {
                errors.push(DependencyIssue {
                    task_id: task.id.clone(),
                    dependency_id: dep.clone(),
                    kind,
                });
            }
        }

        if task.dependencies.len() > config.dependency_warning_threshold {
            warnings.push(ValidationWarning {
                task_id: task.id.clone(),
                kind: WarningKind::ManyDependencies,
                message: format!(
                    "task {} has {} dependencies (more than {})",
                    task.id,
                    task.dependencies.len(),
                    config.dependency_warning_threshold
                ),
            });
        }

        let resolved: Vec<_> = graph
            .dependencies(&task.id)
            .into_iter()
            .filter_map(|id| collection.find(id))
            .collect();

        for dep in resolved.iter().filter(|d| d.status == TaskStatus::Cancelled) {
            warnings.push(ValidationWarning {
                task_id: task.id.clone(),
                kind: WarningKind::CancelledDependency,
                message: format!("task {} depends on cancelled task {}", task.id, dep.id),
            });
        }

        if task.status == TaskStatus::Done {
            let open: Vec<&str> = resolved
                .iter()
                .filter(|d| !d.status.is_terminal())
                .map(|d| d.id.as_str())
                .collect();
            if !open.is_empty() {
                warnings.push(ValidationWarning {
                    task_id: task.id.clone(),
                    kind: WarningKind::DoneWithOpenDependencies,
                    message: format!(
                        "task {} is done but depends on unfinished {}",
                        task.id,
                        open.join(", ")
                    ),
                });
            }
        }
    }

    let cycles = graph.find_cycles();
    ValidationReport {
        valid: errors.is_empty() && cycles.is_empty(),
        errors,
        warnings,
        cycles,
    }
}
