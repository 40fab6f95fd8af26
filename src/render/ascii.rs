//! Plain-text report with optional grouping.

use super::{GraphNode, GraphView, GroupBy, ReportRequest};
use crate::types::{Priority, TaskStatus};
use heck::ToTitleCase;
use std::fmt::Write;

const CRITICAL_MARK: &str = "*";

pub fn render(view: &GraphView, request: &ReportRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Dependency Graph: {} ({} tasks, {} dependencies)",
        view.tag, view.total_tasks, view.total_dependencies
    );
    if let Some(focus) = &request.focus_task {
        let depth = request
            .max_depth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unlimited".to_string());
        let _ = writeln!(out, "Focus: {} (depth {})", focus, depth);
    }
    if request.highlight_critical_path && !view.critical_path.is_empty() {
        let path: Vec<&str> = view.critical_path.iter().map(|e| e.id.as_str()).collect();
        let _ = writeln!(out, "Critical path ({} = member): {}", CRITICAL_MARK, path.join(", "));
    }
    if !view.cycles.is_empty() {
        let _ = writeln!(out, "WARNING: {} dependency cycle(s) present", view.cycles.len());
    }
    out.push('\n');

    if view.nodes.is_empty() {
        out.push_str("(no tasks)\n");
        return out;
    }

    for (label, nodes) in groups(view, request.group_by) {
        let _ = writeln!(out, "=== {} ({}) ===", label, nodes.len());
        for node in nodes {
            write_node(&mut out, view, node, request);
        }
        out.push('\n');
    }

    if request.show_metadata {
        let _ = writeln!(out, "Orphans: {}", list_or_none(&view.orphans));
        let hot: Vec<String> = view
            .bottlenecks
            .iter()
            .map(|b| format!("{} ({} dependents)", b.id, b.dependent_count))
            .collect();
        let _ = writeln!(out, "Bottlenecks: {}", list_or_none(&hot));
    }
    out
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn mark(critical: bool) -> &'static str {
    if critical { CRITICAL_MARK } else { " " }
}

fn write_node(out: &mut String, view: &GraphView, node: &GraphNode, request: &ReportRequest) {
    let impact = if request.analyze_impact {
        format!(
            " | impact {} ({} direct, {} total){}",
            node.impact.impact_score,
            node.impact.direct_dependents,
            node.impact.total_impact,
            if node.is_high_impact() { " HIGH" } else { "" }
        )
    } else {
        String::new()
    };
    let _ = writeln!(
        out,
        "{} [{}] {} ({} | {} | {}h{})",
        mark(node.is_critical),
        node.id,
        node.title,
        node.priority,
        node.status,
        node.effort,
        impact
    );

    let deps: Vec<String> = view
        .dependencies_of(&node.id)
        .map(|e| describe(view, &e.source))
        .collect();
    if !deps.is_empty() {
        let _ = writeln!(out, "      depends on: {}", deps.join(", "));
    }
    let dependents: Vec<String> = view
        .dependents_of(&node.id)
        .map(|e| describe(view, &e.target))
        .collect();
    if !dependents.is_empty() {
        let _ = writeln!(out, "      required by: {}", dependents.join(", "));
    }
}

fn describe(view: &GraphView, id: &str) -> String {
    match view.node(id) {
        Some(node) if node.is_critical => format!("{} {} {}", id, node.title, CRITICAL_MARK),
        Some(node) => format!("{} {}", id, node.title),
        None => format!("{} (unknown)", id),
    }
}

/// Sections in display order; empty sections are skipped.
fn groups(view: &GraphView, group_by: GroupBy) -> Vec<(String, Vec<&GraphNode>)> {
    let all: Vec<&GraphNode> = view.nodes.iter().collect();
    match group_by {
        GroupBy::None => vec![("All Tasks".to_string(), all)],
        GroupBy::Status => TaskStatus::ALL
            .iter()
            .map(|s| {
                let label = s.as_str().to_title_case();
                (label, all.iter().copied().filter(|n| n.status == *s).collect::<Vec<_>>())
            })
            .filter(|(_, nodes)| !nodes.is_empty())
            .collect(),
        GroupBy::Priority => Priority::ALL
            .iter()
            .map(|p| {
                let label = format!("{} Priority", p.as_str().to_title_case());
                (label, all.iter().copied().filter(|n| n.priority == *p).collect::<Vec<_>>())
            })
            .filter(|(_, nodes)| !nodes.is_empty())
            .collect(),
        GroupBy::Assignee => keyed(&all, |n| n.assignee.iter().cloned().collect(), "Unassigned"),
        GroupBy::Tags => keyed(&all, |n| n.tags.clone(), "Untagged"),
    }
}

/// Group by free-form keys in first-seen order; keyless nodes go last.
fn keyed<'a>(
    nodes: &[&'a GraphNode],
    keys: impl Fn(&GraphNode) -> Vec<String>,
    fallback: &str,
) -> Vec<(String, Vec<&'a GraphNode>)> {
    let mut sections: Vec<(String, Vec<&'a GraphNode>)> = Vec::new();
    let mut rest = Vec::new();
    for &node in nodes {
        let node_keys = keys(node);
        if node_keys.is_empty() {
            rest.push(node);
        }
        for key in node_keys {
            match sections.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(node),
                None => sections.push((key, vec![node])),
            }
        }
    }
    if !rest.is_empty() {
        sections.push((fallback.to_string(), rest));
    }
    sections
}
