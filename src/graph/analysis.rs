//! Read-only analytics over a [`DependencyGraph`].
//!
//! Critical path and impact scoring are heuristics. Their thresholds and
//! weights come from [`AnalysisConfig`].

use super::DependencyGraph;
use crate::collection::TaskCollection;
use crate::config::AnalysisConfig;
use crate::types::Priority;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Blast radius of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub id: String,
    pub direct_dependencies: usize,
    pub direct_dependents: usize,
    /// Tasks that depend on this one, directly or transitively.
    pub total_impact: usize,
    /// `direct_dependents * 2 + total_impact`.
    pub impact_score: usize,
    pub is_critical: bool,
}

pub fn impact_of(graph: &DependencyGraph, id: &str, config: &AnalysisConfig) -> Option<ImpactAnalysis> {
    if !graph.contains(id) {
        return None;
    }
    let direct_dependents = graph.dependents(id).len();
    let total_impact = graph.downstream(id).len();
    Some(ImpactAnalysis {
        id: id.to_string(),
        direct_dependencies: graph.dependencies(id).len(),
        direct_dependents,
        total_impact,
        impact_score: direct_dependents * 2 + total_impact,
        is_critical: direct_dependents >= config.critical_dependents_threshold
            || total_impact >= config.critical_total_impact_threshold,
    })
}

/// Impact for every task, in task order.
pub fn impact_analysis(graph: &DependencyGraph, config: &AnalysisConfig) -> Vec<ImpactAnalysis> {
    graph
        .ids()
        .iter()
        .filter_map(|id| impact_of(graph, id, config))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalPathEntry {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub effort: f64,
    /// `weight(priority) * effort`.
    pub score: f64,
}

/// Tasks that are high priority, or expensive and depended upon, ranked by
/// weighted effort. Ties keep task order.
pub fn critical_path(
    collection: &TaskCollection,
    graph: &DependencyGraph,
    config: &AnalysisConfig,
) -> Vec<CriticalPathEntry> {
    let mut entries: Vec<CriticalPathEntry> = collection
        .iter_all()
        .into_iter()
        .filter(|task| {
            task.priority.is_high()
                || (task.effort() >= config.high_effort_threshold
                    && !graph.dependents(&task.id).is_empty())
        })
        .map(|task| CriticalPathEntry {
            id: task.id.clone(),
            title: task.title.clone(),
            priority: task.priority,
            effort: task.effort(),
            score: config.priority_weights.weight(task.priority) * task.effort(),
        })
        .collect();
    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
    entries
}

/// Tasks with neither dependencies nor dependents.
pub fn orphans(graph: &DependencyGraph) -> Vec<String> {
    graph
        .ids()
        .iter()
        .filter(|id| graph.dependencies(id).is_empty() && graph.dependents(id).is_empty())
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    pub id: String,
    pub dependent_count: usize,
}

/// Tasks with at least `threshold` direct dependents, most depended-on first.
pub fn bottlenecks(graph: &DependencyGraph, threshold: usize) -> Vec<Bottleneck> {
    let mut out: Vec<Bottleneck> = graph
        .ids()
        .iter()
        .map(|id| Bottleneck {
            id: id.clone(),
            dependent_count: graph.dependents(id).len(),
        })
        .filter(|b| b.dependent_count >= threshold)
        .collect();
    out.sort_by(|a, b| b.dependent_count.cmp(&a.dependent_count));
    out
}

/// Ids within `max_depth` hops of `focus` in either direction, including
/// `focus`. `None` means unbounded.
pub fn subgraph(graph: &DependencyGraph, focus: &str, max_depth: Option<usize>) -> HashSet<String> {
    let mut ids: HashSet<String> = HashSet::new();
    if !graph.contains(focus) {
        return ids;
    }
    ids.insert(focus.to_string());
    ids.extend(graph.upstream_within(focus, max_depth));
    ids.extend(graph.downstream_within(focus, max_depth));
    ids
}
