//! Mermaid flowchart source.

use super::{GraphNode, GraphView, ReportRequest, truncate};
use crate::types::TaskStatus;
use std::fmt::Write;

/// Mermaid node ids allow only word characters.
///
/// ASCII letters and digits pass through, `_` doubles, and anything else
/// becomes `_<hex>_`, so distinct task ids never share a node.
fn node_id(id: &str) -> String {
    let mut out = String::from("t_");
    for c in id.chars() {
        match c {
            c if c.is_ascii_alphanumeric() => out.push(c),
            '_' => out.push_str("__"),
            c => {
                let _ = write!(out, "_{:x}_", u32::from(c));
            }
        }
    }
    out
}

fn label(text: &str) -> String {
    text.replace('"', "#quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn render(view: &GraphView, request: &ReportRequest) -> String {
    let mut out = String::from("graph TD\n");
    out.push_str("    classDef critical fill:#ff6b6b,stroke:#c92a2a,color:#fff\n");
    out.push_str("    classDef highImpact fill:#ffd93d,stroke:#f59f00,color:#000\n");
    out.push_str("    classDef done fill:#b7e4c7,stroke:#2b8a3e,color:#000\n");

    for node in &view.nodes {
        let mut text = format!("{}: {}", node.id, label(&truncate(&node.title, 30)));
        if request.analyze_impact {
            let _ = write!(text, "<br/>impact {}", node.impact.impact_score);
        }
        let _ = writeln!(out, "    {}[\"{}\"]", node_id(&node.id), text);
    }

    for edge in &view.edges {
        let arrow = if edge.critical { "==>" } else { "-->" };
        let _ = writeln!(out, "    {} {} {}", node_id(&edge.source), arrow, node_id(&edge.target));
    }

    write_class(&mut out, view, "critical", |n| n.is_critical);
    write_class(&mut out, view, "highImpact", |n| {
        !n.is_critical && request.analyze_impact && n.is_high_impact()
    });
    write_class(&mut out, view, "done", |n| {
        !n.is_critical && n.status == TaskStatus::Done
    });
    out
}

fn write_class(out: &mut String, view: &GraphView, class: &str, pick: impl Fn(&GraphNode) -> bool) {
    let ids: Vec<String> = view
        .nodes
        .iter()
        .filter(|&n| pick(n))
        .map(|n| node_id(&n.id))
        .collect();
    if !ids.is_empty() {
        let _ = writeln!(out, "    class {} {}", ids.join(","), class);
    }
}
