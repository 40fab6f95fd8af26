//! Graph subcommand for task-graph CLI

use crate::render::{GroupBy, ReportFormat, ReportRequest};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the graph subcommand
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// ascii, json, dot, mermaid, html, or all
    #[arg(long, default_value = "ascii")]
    pub format: ReportFormat,

    /// Section the ASCII report by none, priority, status, assignee, or tags
    #[arg(long, default_value = "none")]
    pub group_by: GroupBy,

    /// Only draw tasks connected to this one
    #[arg(long, value_name = "ID")]
    pub focus: Option<String>,

    /// Hop limit around --focus
    #[arg(long, requires = "focus")]
    pub depth: Option<usize>,

    /// Hide tasks with neither dependencies nor dependents
    #[arg(long)]
    pub no_orphans: bool,

    /// Include type, assignee, labels, orphans, and bottlenecks
    #[arg(long)]
    pub metadata: bool,

    /// Include per-task impact analysis
    #[arg(long)]
    pub impact: bool,

    /// Do not highlight the critical path
    #[arg(long)]
    pub no_highlight: bool,

    /// Write the rendered graph to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl GraphArgs {
    pub fn into_request(self, tag: &str) -> ReportRequest {
        ReportRequest {
            tag: tag.to_string(),
            output_format: self.format,
            include_orphans: !self.no_orphans,
            max_depth: self.depth,
            focus_task: self.focus,
            group_by: self.group_by,
            show_metadata: self.metadata,
            highlight_critical_path: !self.no_highlight,
            analyze_impact: self.impact,
        }
    }
}
