//! Directed-graph JSON document.

use super::{GraphView, ReportRequest};
use serde_json::{Map, Value, json};

pub fn render(view: &GraphView, request: &ReportRequest) -> Value {
    let nodes: Vec<Value> = view
        .nodes
        .iter()
        .map(|node| {
            let mut value = json!({
                "id": node.id,
                "label": node.title,
                "priority": node.priority,
                "status": node.status,
                "effort": node.effort,
                "isCritical": node.is_critical,
                "impact": node.impact.impact_score,
            });
            if request.show_metadata || request.analyze_impact {
                let mut metadata = Map::new();
                if request.show_metadata {
                    metadata.insert("type".into(), json!(node.task_type));
                    metadata.insert("assignee".into(), json!(node.assignee));
                    metadata.insert("tags".into(), json!(node.tags));
                }
                if request.analyze_impact {
                    metadata.insert("impactAnalysis".into(), json!(node.impact));
                }
                value["metadata"] = Value::Object(metadata);
            }
            value
        })
        .collect();

    let edges: Vec<Value> = view
        .edges
        .iter()
        .map(|edge| {
            json!({
                "source": edge.source,
                "target": edge.target,
                "type": "dependency",
                "critical": edge.critical,
            })
        })
        .collect();

    json!({
        "directed": true,
        "tag": view.tag,
        "nodes": nodes,
        "edges": edges,
        "criticalPath": view.critical_path,
        "cycles": view.cycles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::render::fixtures;

    #[test]
    fn edges_point_from_dependency_to_dependent() {
        let request = ReportRequest::new("master");
        let view = GraphView::build(&fixtures::sample(), &request, &AnalysisConfig::default()).unwrap();
        let doc = render(&view, &request);

        assert_eq!(doc["directed"], true);
        assert_eq!(doc["nodes"].as_array().unwrap().len(), 5);
        let edges = doc["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0]["source"], "1");
        assert_eq!(edges[0]["target"], "2");
        assert_eq!(edges[0]["type"], "dependency");
        assert_eq!(doc["nodes"][0]["isCritical"], true);
        assert!(doc["nodes"][0].get("metadata").is_none());
    }

    #[test]
    fn metadata_is_opt_in() {
        let mut request = ReportRequest::new("master");
        request.show_metadata = true;
        request.analyze_impact = true;
        let view = GraphView::build(&fixtures::sample(), &request, &AnalysisConfig::default()).unwrap();
        let doc = render(&view, &request);
        let meta = &doc["nodes"][0]["metadata"];
        assert_eq!(meta["assignee"], "ana");
        assert_eq!(meta["impactAnalysis"]["totalImpact"], 3);
    }
}
