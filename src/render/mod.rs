//! Dependency-graph reports.
//!
//! [`GraphView`] is the filtered, analysed snapshot every renderer draws
//! from. Renderers are pure functions of the view and the request; only
//! [`generate_report`] stamps the time.

pub mod ascii;
pub mod dot;
pub mod html;
pub mod json;
pub mod mermaid;

use crate::collection::TaskCollection;
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::graph::analysis::{self, Bottleneck, CriticalPathEntry, ImpactAnalysis};
use crate::types::{Priority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Ascii,
    Json,
    Dot,
    Mermaid,
    Html,
    /// Every format at once.
    All,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Ascii => "ascii",
            ReportFormat::Json => "json",
            ReportFormat::Dot => "dot",
            ReportFormat::Mermaid => "mermaid",
            ReportFormat::Html => "html",
            ReportFormat::All => "all",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ascii" | "text" => Ok(ReportFormat::Ascii),
            "json" => Ok(ReportFormat::Json),
            "dot" | "graphviz" => Ok(ReportFormat::Dot),
            "mermaid" => Ok(ReportFormat::Mermaid),
            "html" => Ok(ReportFormat::Html),
            "all" => Ok(ReportFormat::All),
            _ => Err(format!("unknown output format '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    None,
    Priority,
    Status,
    Assignee,
    /// By label; a task with several labels appears under each.
    Tags,
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(GroupBy::None),
            "priority" => Ok(GroupBy::Priority),
            "status" => Ok(GroupBy::Status),
            "assignee" => Ok(GroupBy::Assignee),
            "tags" | "tag" | "label" => Ok(GroupBy::Tags),
            _ => Err(format!("unknown grouping '{}'", s)),
        }
    }
}

/// Input of a dependency-graph report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub tag: String,
    #[serde(default)]
    pub output_format: ReportFormat,
    #[serde(default = "default_true")]
    pub include_orphans: bool,
    /// Hop limit around `focus_task`; ignored without one.
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub focus_task: Option<String>,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub show_metadata: bool,
    #[serde(default = "default_true")]
    pub highlight_critical_path: bool,
    #[serde(default)]
    pub analyze_impact: bool,
}

fn default_true() -> bool {
    true
}

impl ReportRequest {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            output_format: ReportFormat::default(),
            include_orphans: true,
            max_depth: None,
            focus_task: None,
            group_by: GroupBy::default(),
            show_metadata: false,
            highlight_critical_path: true,
            analyze_impact: false,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub effort: f64,
    pub task_type: Option<String>,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
    /// On the critical path, and highlighting was requested.
    pub is_critical: bool,
    pub impact: ImpactAnalysis,
}

impl GraphNode {
    /// High impact by the configured thresholds.
    pub fn is_high_impact(&self) -> bool {
        self.impact.is_critical
    }
}

/// `source` is the dependency, `target` the task that depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// Both ends are on the highlighted critical path.
    pub critical: bool,
}

/// Filtered, analysed snapshot of a tag's dependency graph.
#[derive(Debug, Clone)]
pub struct GraphView {
    pub tag: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub critical_path: Vec<CriticalPathEntry>,
    pub orphans: Vec<String>,
    pub bottlenecks: Vec<Bottleneck>,
    pub cycles: Vec<Vec<String>>,
    pub total_tasks: usize,
    pub total_dependencies: usize,
    lookup: HashMap<String, usize>,
}

impl GraphView {
    /// Apply focus and orphan filters and attach analytics.
    ///
    /// Analytics run on the whole tag; filters only decide what is drawn.
    /// The focus task is always kept.
    pub fn build(collection: &TaskCollection, request: &ReportRequest, config: &AnalysisConfig) -> Result<Self> {
        let full = DependencyGraph::from_collection(collection);
        let critical_path = analysis::critical_path(collection, &full, config);
        let orphans = analysis::orphans(&full);
        let bottlenecks = analysis::bottlenecks(&full, config.bottleneck_threshold);
        let cycles = full.find_cycles();

        let mut keep: HashSet<String> = match request.focus_task.as_deref() {
            Some(focus) => {
                if !full.contains(focus) {
                    return Err(Error::task_not_found(focus, &request.tag));
                }
                analysis::subgraph(&full, focus, request.max_depth)
            }
            None => full.ids().iter().cloned().collect(),
        };
        if !request.include_orphans {
            for id in &orphans {
                if request.focus_task.as_deref() != Some(id.as_str()) {
                    keep.remove(id);
                }
            }
        }
        let shown = full.retain(&keep);

        let critical: HashSet<&str> = if request.highlight_critical_path {
            critical_path.iter().map(|e| e.id.as_str()).collect()
        } else {
            HashSet::new()
        };

        let mut nodes = Vec::with_capacity(shown.len());
        for task in collection.iter_all() {
            if !shown.contains(&task.id) {
                continue;
            }
            let Some(impact) = analysis::impact_of(&full, &task.id, config) else {
                continue;
            };
            nodes.push(GraphNode {
                id: task.id.clone(),
                title: task.title.clone(),
                priority: task.priority,
                status: task.status,
                effort: task.effort(),
                task_type: task.task_type.clone(),
                assignee: task.assignee.clone(),
                tags: task.tags.clone(),
                is_critical: critical.contains(task.id.as_str()),
                impact,
            });
        }

        let edges = shown
            .edges()
            .into_iter()
            .map(|(source, target)| GraphEdge {
                source: source.to_string(),
                target: target.to_string(),
                critical: critical.contains(source) && critical.contains(target),
            })
            .collect();

        let lookup = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        Ok(GraphView {
            tag: request.tag.clone(),
            nodes,
            edges,
            critical_path,
            orphans,
            bottlenecks,
            cycles,
            total_tasks: full.len(),
            total_dependencies: full.edge_count(),
            lookup,
        })
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.lookup.get(id).map(|&i| &self.nodes[i])
    }

    pub fn title_of(&self, id: &str) -> Option<&str> {
        self.node(id).map(|n| n.title.as_str())
    }

    /// Shown dependencies of `id`.
    pub fn dependencies_of(&self, id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Shown dependents of `id`.
    pub fn dependents_of(&self, id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.source == id)
    }
}

/// Every format rendered from the same view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllFormats {
    pub ascii: String,
    pub json: Value,
    pub dot: String,
    pub mermaid: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rendered {
    Text(String),
    Object(Value),
    All(Box<AllFormats>),
}

impl Rendered {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Rendered::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub tag: String,
    pub format: ReportFormat,
    pub total_tasks: usize,
    pub total_dependencies: usize,
    pub rendered_nodes: usize,
    pub rendered_edges: usize,
    pub critical_path_length: usize,
    pub orphan_count: usize,
    pub bottleneck_count: usize,
    pub cycle_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_task: Option<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub rendered: Rendered,
    pub metadata: ReportMetadata,
}

pub fn generate_report(
    collection: &TaskCollection,
    request: &ReportRequest,
    config: &AnalysisConfig,
) -> Result<Report> {
    let view = GraphView::build(collection, request, config)?;

    let rendered = match request.output_format {
        ReportFormat::Ascii => Rendered::Text(ascii::render(&view, request)),
        ReportFormat::Json => Rendered::Object(json::render(&view, request)),
        ReportFormat::Dot => Rendered::Text(dot::render(&view, request)),
        ReportFormat::Mermaid => Rendered::Text(mermaid::render(&view, request)),
        ReportFormat::Html => Rendered::Text(html::render(&view, request)),
        ReportFormat::All => Rendered::All(Box::new(AllFormats {
            ascii: ascii::render(&view, request),
            json: json::render(&view, request),
            dot: dot::render(&view, request),
            mermaid: mermaid::render(&view, request),
            html: html::render(&view, request),
        })),
    };

    Ok(Report {
        rendered,
        metadata: ReportMetadata {
            tag: view.tag.clone(),
            format: request.output_format,
            total_tasks: view.total_tasks,
            total_dependencies: view.total_dependencies,
            rendered_nodes: view.nodes.len(),
            rendered_edges: view.edges.len(),
            critical_path_length: view.critical_path.len(),
            orphan_count: view.orphans.len(),
            bottleneck_count: view.bottlenecks.len(),
            cycle_count: view.cycles.len(),
            focus_task: request.focus_task.clone(),
            generated_at: Utc::now(),
        },
    })
}

/// Shorten to `max` characters, ending with `...` when cut.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
