//! Dependency mutations and queries against a stored tag.

use super::analysis::{self, CriticalPathEntry, ImpactAnalysis};
use super::{DependencyGraph, DependencyIssue, ValidationReport, validate};
use crate::collection::TaskCollection;
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::render::{self, Report, ReportRequest};
use crate::store::TaskStore;
use crate::types::TaskRef;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Result of [`DependencyGraphManager::fix_dependencies`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSummary {
    pub removed: Vec<DependencyIssue>,
    /// Cycles are reported, never broken automatically.
    pub remaining_cycles: Vec<Vec<String>>,
}

impl FixSummary {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Maintains the dependency relation of each tag.
#[derive(Debug, Clone)]
pub struct DependencyGraphManager {
    store: TaskStore,
    config: AnalysisConfig,
}

impl DependencyGraphManager {
    pub fn new(store: TaskStore, config: AnalysisConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Make `task_id` depend on `dep_id`.
    ///
    /// Returns `false` if the edge already existed. An edge that would close
    /// a cycle is rejected with the cycle, starting and ending at `task_id`,
    /// and the stored document is left untouched.
    pub fn add_dependency(&self, task_id: &str, dep_id: &str, tag: &str) -> Result<bool> {
        if task_id == dep_id {
            return Err(Error::validation(
                "dependencies",
                format!("task {} cannot depend on itself", task_id),
            ));
        }

        self.store.with_tag_mut(tag, |collection| {
            let task = collection.require(task_id, tag)?;
            collection.require(dep_id, tag)?;
            if task.dependencies.iter().any(|d| d == dep_id) {
                debug!(task_id, dep_id, tag, "Dependency already present");
                return Ok(false);
            }

            let mut tentative = DependencyGraph::from_collection(collection);
            tentative.add_edge(task_id, dep_id);
            let cycle = tentative
                .find_cycles()
                .into_iter()
                .find_map(|cycle| rotate_to_edge(&cycle, task_id, dep_id))
                .or_else(|| tentative.cycle_through(task_id, dep_id));
            if let Some(cycle) = cycle {
                warn!(task_id, dep_id, tag, cycle = %cycle.join(" -> "), "Rejected circular dependency");
                return Err(Error::CircularDependency { cycle });
            }

            let task = collection.require_mut(task_id, tag)?;
            task.dependencies.push(dep_id.to_string());
            task.metadata.touch();
            let count = task.dependencies.len();
            if count > self.config.dependency_warning_threshold {
                warn!(task_id, count, "Task has an unusually large number of dependencies");
            }
            info!(task_id, dep_id, tag, "Added dependency");
            Ok(true)
        })
    }

    /// Remove the edge if present. Returns whether anything was removed.
    pub fn remove_dependency(&self, task_id: &str, dep_id: &str, tag: &str) -> Result<bool> {
        self.store.with_tag_mut(tag, |collection| {
            let task = collection.require_mut(task_id, tag)?;
            let before = task.dependencies.len();
            task.dependencies.retain(|d| d != dep_id);
            if task.dependencies.len() == before {
                debug!(task_id, dep_id, tag, "Dependency not present");
                return Ok(false);
            }
            task.metadata.touch();
            info!(task_id, dep_id, tag, "Removed dependency");
            Ok(true)
        })
    }

    pub fn validate_dependencies(&self, tag: &str) -> Result<ValidationReport> {
        self.store
            .with_tag(tag, |collection| Ok(validate(collection, &self.config)))
    }

    /// Direct dependencies of `id`. Dangling ids become placeholders.
    pub fn get_dependencies(&self, id: &str, tag: &str) -> Result<Vec<TaskRef>> {
        self.store.with_tag(tag, |collection| {
            let task = collection.require(id, tag)?;
            Ok(task
                .dependencies
                .iter()
                .map(|dep| resolve(collection, dep))
                .collect())
        })
    }

    /// Tasks that list `id` as a dependency.
    pub fn get_dependents(&self, id: &str, tag: &str) -> Result<Vec<TaskRef>> {
        self.store.with_tag(tag, |collection| {
            collection.require(id, tag)?;
            Ok(collection
                .dependents_of(id)
                .iter()
                .map(|dependent| resolve(collection, dependent))
                .collect())
        })
    }

    /// Drop dangling, self, and repeated dependency entries.
    pub fn fix_dependencies(&self, tag: &str) -> Result<FixSummary> {
        self.store.with_tag_mut(tag, |collection| {
            let report = validate(collection, &self.config);
            if !report.errors.is_empty() {
                let known: HashSet<String> =
                    collection.iter_all().iter().map(|t| t.id.clone()).collect();
                collection.for_each_mut(|task| {
                    let own = task.id.clone();
                    let mut seen: HashSet<String> = HashSet::new();
                    let before = task.dependencies.len();
                    task.dependencies
                        .retain(|d| *d != own && known.contains(d) && seen.insert(d.clone()));
                    if task.dependencies.len() != before {
                        task.metadata.touch();
                    }
                });
                info!(tag, removed = report.errors.len(), "Fixed dependency references");
            }

            let remaining_cycles = DependencyGraph::from_collection(collection).find_cycles();
            if !remaining_cycles.is_empty() {
                warn!(tag, cycles = remaining_cycles.len(), "Cycles remain after fixing references");
            }
            Ok(FixSummary {
                removed: report.errors,
                remaining_cycles,
            })
        })
    }

    pub fn critical_path(&self, tag: &str) -> Result<Vec<CriticalPathEntry>> {
        self.store.with_tag(tag, |collection| {
            let graph = DependencyGraph::from_collection(collection);
            Ok(analysis::critical_path(collection, &graph, &self.config))
        })
    }

    pub fn impact_analysis(&self, tag: &str) -> Result<Vec<ImpactAnalysis>> {
        self.store.with_tag(tag, |collection| {
            let graph = DependencyGraph::from_collection(collection);
            Ok(analysis::impact_analysis(&graph, &self.config))
        })
    }

    /// Render a dependency-graph report for `request.tag`.
    pub fn report(&self, request: &ReportRequest) -> Result<Report> {
        self.store.with_tag(&request.tag, |collection| {
            render::generate_report(collection, request, &self.config)
        })
    }
}

fn resolve(collection: &TaskCollection, id: &str) -> TaskRef {
    collection
        .find(id)
        .map(|t| t.to_ref())
        .unwrap_or_else(|| TaskRef::placeholder(id))
}

/// Rotate a closed cycle so it starts with the edge `from -> to`, or `None`
/// if the cycle does not use that edge.
fn rotate_to_edge(cycle: &[String], from: &str, to: &str) -> Option<Vec<String>> {
    let body = cycle.get(..cycle.len().checked_sub(1)?)?;
    let n = body.len();
    let start = (0..n).find(|&i| body[i] == from && body[(i + 1) % n] == to)?;
    let mut rotated: Vec<String> = body[start..].iter().chain(&body[..start]).cloned().collect();
    rotated.push(from.to_string());
    Some(rotated)
}
