//! Integration tests for dependency-graph reports rendered from disk.

use std::collections::BTreeSet;
use task_graph::collection::TaskCollection;
use task_graph::config::AnalysisConfig;
use task_graph::error::ErrorCode;
use task_graph::graph::deps::DependencyGraphManager;
use task_graph::render::{GroupBy, ReportFormat, ReportRequest, Rendered};
use task_graph::store::TaskStore;
use task_graph::types::{Priority, Task, TaskStatus};
use tempfile::TempDir;

const TAG: &str = "master";

/// Release plan: 1 <- 2 <- 4, 1 <- 3 <- 4, 5 standalone.
fn setup() -> (TempDir, DependencyGraphManager) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = TaskStore::new(dir.path().join("tasks.json"));
    let tasks = vec![
        Task::new("1", "Cut release branch")
            .with_priority(Priority::High)
            .with_status(TaskStatus::Done),
        Task::new("2", "Build artifacts")
            .with_dependencies(["1"])
            .with_estimate(5.0),
        Task::new("3", "Write changelog").with_dependencies(["1"]),
        Task::new("4", "Publish")
            .with_dependencies(["2", "3"])
            .with_priority(Priority::Critical),
        Task::new("5", "Update website").with_priority(Priority::Low),
    ];
    store
        .save(TAG, &TaskCollection::from_tasks(tasks))
        .expect("Failed to seed tasks");
    (dir, DependencyGraphManager::new(store, AnalysisConfig::default()))
}

fn text(deps: &DependencyGraphManager, request: &ReportRequest) -> String {
    let report = deps.report(request).expect("Failed to render report");
    report
        .rendered
        .as_text()
        .expect("expected a text rendering")
        .to_string()
}

mod format_tests {
    use super::*;

    fn json_edges(doc: &serde_json::Value) -> BTreeSet<(String, String)> {
        doc["edges"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| {
                assert_eq!(e["type"], "dependency");
                (
                    e["source"].as_str().unwrap().to_string(),
                    e["target"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    /// Pairs read back from the "depends on" lines under each task.
    fn ascii_edges(text: &str) -> BTreeSet<(String, String)> {
        let mut edges = BTreeSet::new();
        let mut current = None;
        for line in text.lines() {
            if let Some(rest) = line.get(2..).and_then(|l| l.strip_prefix('[')) {
                current = rest.split(']').next().map(str::to_string);
            } else if let Some(list) = line.trim_start().strip_prefix("depends on: ") {
                let task = current.clone().expect("dependency line before any task");
                for item in list.split(", ") {
                    let dep = item.split(' ').next().unwrap().to_string();
                    edges.insert((dep, task.clone()));
                }
            }
        }
        edges
    }

    fn dot_edges(text: &str) -> BTreeSet<(String, String)> {
        text.lines()
            .filter_map(|l| l.trim().split_once(" -> "))
            .map(|(from, to)| {
                let to = to.split([' ', ';']).next().unwrap();
                (from.trim_matches('"').to_string(), to.trim_matches('"').to_string())
            })
            .collect()
    }

    fn html_payload(page: &str) -> serde_json::Value {
        let marker = "id=\"graph-data\">";
        let start = page.find(marker).unwrap() + marker.len();
        let end = start + page[start..].find("</script>").unwrap();
        serde_json::from_str(&page[start..end]).unwrap()
    }

    #[test]
    fn every_format_draws_the_same_edges() {
        let (_dir, deps) = setup();

        let json = deps
            .report(&ReportRequest::new(TAG).with_format(ReportFormat::Json))
            .unwrap();
        let Rendered::Object(doc) = &json.rendered else {
            panic!("json format renders an object");
        };
        let expected = json_edges(doc);
        let pairs = |v: &[(&str, &str)]| -> BTreeSet<(String, String)> {
            v.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
        };
        assert_eq!(expected, pairs(&[("1", "2"), ("1", "3"), ("2", "4"), ("3", "4")]));
        assert_eq!(json.metadata.rendered_edges, 4);

        let ascii = text(&deps, &ReportRequest::new(TAG));
        assert_eq!(ascii_edges(&ascii), expected);

        let dot = text(&deps, &ReportRequest::new(TAG).with_format(ReportFormat::Dot));
        assert_eq!(dot.matches(" -> ").count(), expected.len());
        assert_eq!(dot_edges(&dot), expected);

        let mermaid = text(&deps, &ReportRequest::new(TAG).with_format(ReportFormat::Mermaid));
        let mermaid_edges = mermaid
            .lines()
            .filter(|l| l.contains(" --> ") || l.contains(" ==> "))
            .count();
        assert_eq!(mermaid_edges, expected.len());

        let html = text(&deps, &ReportRequest::new(TAG).with_format(ReportFormat::Html));
        assert_eq!(json_edges(&html_payload(&html)), expected);
    }

    #[test]
    fn critical_path_edges_are_highlighted() {
        let (_dir, deps) = setup();
        let mermaid = text(&deps, &ReportRequest::new(TAG).with_format(ReportFormat::Mermaid));

        // 2 (5h) and 4 (critical) are both on the path; 1 is high priority.
        assert!(mermaid.contains("t_2 ==> t_4"));
        assert!(mermaid.contains("t_1 ==> t_2"));
        assert!(mermaid.contains("t_3 --> t_4"));

        let mut request = ReportRequest::new(TAG).with_format(ReportFormat::Mermaid);
        request.highlight_critical_path = false;
        let plain = text(&deps, &request);
        assert!(!plain.contains("==>"));
        assert!(!plain.contains("class t_4 critical"));
    }

    #[test]
    fn all_format_bundles_every_rendering() {
        let (_dir, deps) = setup();
        let report = deps
            .report(&ReportRequest::new(TAG).with_format(ReportFormat::All))
            .unwrap();
        let Rendered::All(all) = &report.rendered else {
            panic!("all format renders every output");
        };
        assert!(all.ascii.starts_with("Dependency Graph: master (5 tasks, 4 dependencies)"));
        assert!(all.dot.starts_with("digraph"));
        assert!(all.mermaid.starts_with("graph TD"));
        assert!(all.html.contains("id=\"graph-data\""));
        assert_eq!(all.json["nodes"].as_array().unwrap().len(), 5);

        let serialized = serde_json::to_value(&report).unwrap();
        assert_eq!(serialized["metadata"]["format"], "all");
        assert!(serialized["rendered"]["dot"].is_string());
    }

    #[test]
    fn html_is_self_contained() {
        let (_dir, deps) = setup();
        let html = text(&deps, &ReportRequest::new(TAG).with_format(ReportFormat::Html));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Dependency Graph: master"));
        assert!(!html.contains("<script src="));
        assert!(!html.contains("<link "));
    }
}

mod filter_tests {
    use super::*;

    #[test]
    fn ascii_groups_by_priority() {
        let (_dir, deps) = setup();
        let mut request = ReportRequest::new(TAG);
        request.group_by = GroupBy::Priority;
        let report = text(&deps, &request);

        let headers: Vec<&str> = report.lines().filter(|l| l.starts_with("===")).collect();
        assert_eq!(
            headers,
            vec![
                "=== Critical Priority (1) ===",
                "=== High Priority (1) ===",
                "=== Medium Priority (2) ===",
                "=== Low Priority (1) ==="
            ]
        );
    }

    #[test]
    fn focus_and_depth_limit_the_drawing_not_the_analysis() {
        let (_dir, deps) = setup();
        let mut request = ReportRequest::new(TAG).with_format(ReportFormat::Json);
        request.focus_task = Some("3".into());
        request.max_depth = Some(1);
        let report = deps.report(&request).unwrap();

        assert_eq!(report.metadata.rendered_nodes, 3);
        assert_eq!(report.metadata.rendered_edges, 2);
        assert_eq!(report.metadata.total_tasks, 5);
        assert_eq!(report.metadata.total_dependencies, 4);
        assert_eq!(report.metadata.focus_task.as_deref(), Some("3"));
    }

    #[test]
    fn orphans_hidden_on_request() {
        let (_dir, deps) = setup();
        let mut request = ReportRequest::new(TAG).with_format(ReportFormat::Dot);
        request.include_orphans = false;
        let dot = text(&deps, &request);
        assert!(!dot.contains("Update website"));
        assert!(dot.contains("Publish"));
    }

    #[test]
    fn unknown_focus_is_not_found() {
        let (_dir, deps) = setup();
        let mut request = ReportRequest::new(TAG);
        request.focus_task = Some("42".into());
        let err = deps.report(&request).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn empty_tag_renders_without_error() {
        let (_dir, deps) = setup();
        let report = text(&deps, &ReportRequest::new("empty"));
        assert!(report.starts_with("Dependency Graph: empty (0 tasks, 0 dependencies)"));
        assert!(report.contains("(no tasks)"));
    }
}
