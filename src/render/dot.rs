//! Graphviz DOT source.

use super::{GraphNode, GraphView, ReportRequest, truncate};
use crate::types::TaskStatus;
use std::fmt::Write;

const FILL_CRITICAL: &str = "#ff6b6b";
const FILL_HIGH_IMPACT: &str = "#ffd93d";
const FILL_DONE: &str = "#b7e4c7";
const FILL_DEFAULT: &str = "#e9ecef";

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn fill(node: &GraphNode, request: &ReportRequest) -> &'static str {
    if node.is_critical {
        FILL_CRITICAL
    } else if request.analyze_impact && node.is_high_impact() {
        FILL_HIGH_IMPACT
    } else if node.status == TaskStatus::Done {
        FILL_DONE
    } else {
        FILL_DEFAULT
    }
}

pub fn render(view: &GraphView, request: &ReportRequest) -> String {
    let mut out = String::new();
    out.push_str("digraph dependencies {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\"];\n");
    out.push_str("    edge [color=\"#6c757d\"];\n");
    let _ = writeln!(out, "    label={};", quote(&format!("Dependencies: {}", view.tag)));

    for node in &view.nodes {
        let mut label = format!(
            "{}: {}\n{} | {}",
            node.id,
            truncate(&node.title, 40),
            node.priority,
            node.status
        );
        if request.analyze_impact {
            let _ = write!(label, "\nimpact {}", node.impact.impact_score);
        }
        let _ = writeln!(
            out,
            "    {} [label={}, fillcolor=\"{}\"];",
            quote(&node.id),
            quote(&label).replace('\n', "\\n"),
            fill(node, request)
        );
    }

    for edge in &view.edges {
        let style = if edge.critical {
            " [color=\"#d00000\", penwidth=2.5]"
        } else {
            ""
        };
        let _ = writeln!(out, "    {} -> {}{};", quote(&edge.source), quote(&edge.target), style);
    }

    out.push_str("}\n");
    out
}
