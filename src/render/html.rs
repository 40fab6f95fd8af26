//! Self-contained HTML page with a force-directed layout.
//!
//! The JSON report is embedded verbatim in a `<script type="application/json">`
//! block and laid out by a small inline script on a canvas.

use super::{GraphView, ReportRequest, json};

const PAGE_HEAD: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{TITLE}}</title>
<style>
  body { margin: 0; font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; background: #1a1a2e; color: #eee; }
  header { padding: 12px 16px; background: #16213e; }
  header h1 { margin: 0; font-size: 18px; }
  header p { margin: 4px 0 0; font-size: 13px; color: #a0a0a0; }
  canvas { display: block; width: 100vw; height: calc(100vh - 64px); }
</style>
</head>
<body>
<header>
  <h1>{{TITLE}}</h1>
  <p>{{SUMMARY}}</p>
</header>
<canvas id="graph"></canvas>
<script type="application/json" id="graph-data">"##;

const PAGE_TAIL: &str = r##"</script>
<script>
(function () {
  var data = JSON.parse(document.getElementById("graph-data").textContent);
  var canvas = document.getElementById("graph");
  var ctx = canvas.getContext("2d");
  var w = canvas.width = canvas.clientWidth;
  var h = canvas.height = canvas.clientHeight;
  var index = {};
  var nodes = data.nodes.map(function (n, i) {
    var angle = (2 * Math.PI * i) / Math.max(1, data.nodes.length);
    var node = { data: n, x: w / 2 + Math.cos(angle) * w / 4, y: h / 2 + Math.sin(angle) * h / 4, vx: 0, vy: 0 };
    index[n.id] = node;
    return node;
  });
  var links = data.edges
    .filter(function (e) { return index[e.source] && index[e.target]; })
    .map(function (e) { return { s: index[e.source], t: index[e.target], critical: e.critical }; });

  function step() {
    for (var i = 0; i < nodes.length; i++) {
      for (var j = i + 1; j < nodes.length; j++) {
        var a = nodes[i], b = nodes[j];
        var dx = a.x - b.x, dy = a.y - b.y;
        var d2 = Math.max(dx * dx + dy * dy, 25);
        var f = 2000 / d2;
        a.vx += dx * f / Math.sqrt(d2); a.vy += dy * f / Math.sqrt(d2);
        b.vx -= dx * f / Math.sqrt(d2); b.vy -= dy * f / Math.sqrt(d2);
      }
    }
    links.forEach(function (l) {
      var dx = l.t.x - l.s.x, dy = l.t.y - l.s.y;
      var d = Math.max(Math.sqrt(dx * dx + dy * dy), 1);
      var f = (d - 120) * 0.01;
      l.s.vx += dx / d * f; l.s.vy += dy / d * f;
      l.t.vx -= dx / d * f; l.t.vy -= dy / d * f;
    });
    nodes.forEach(function (n) {
      n.vx += (w / 2 - n.x) * 0.002; n.vy += (h / 2 - n.y) * 0.002;
      n.vx *= 0.85; n.vy *= 0.85;
      n.x = Math.min(w - 20, Math.max(20, n.x + n.vx));
      n.y = Math.min(h - 20, Math.max(20, n.y + n.vy));
    });
  }

  function color(n) {
    if (n.isCritical) return "#ff6b6b";
    if (n.status === "done") return "#b7e4c7";
    if (n.status === "in-progress") return "#60a5fa";
    return "#e9ecef";
  }

  function draw() {
    ctx.clearRect(0, 0, w, h);
    links.forEach(function (l) {
      ctx.strokeStyle = l.critical ? "#d00000" : "#6c757d";
      ctx.lineWidth = l.critical ? 2.5 : 1;
      ctx.beginPath(); ctx.moveTo(l.s.x, l.s.y); ctx.lineTo(l.t.x, l.t.y); ctx.stroke();
      var angle = Math.atan2(l.t.y - l.s.y, l.t.x - l.s.x);
      var tx = l.t.x - Math.cos(angle) * 14, ty = l.t.y - Math.sin(angle) * 14;
      ctx.beginPath();
      ctx.moveTo(tx, ty);
      ctx.lineTo(tx - 8 * Math.cos(angle - 0.4), ty - 8 * Math.sin(angle - 0.4));
      ctx.lineTo(tx - 8 * Math.cos(angle + 0.4), ty - 8 * Math.sin(angle + 0.4));
      ctx.closePath(); ctx.fillStyle = ctx.strokeStyle; ctx.fill();
    });
    nodes.forEach(function (n) {
      ctx.fillStyle = color(n.data);
      ctx.beginPath(); ctx.arc(n.x, n.y, 12, 0, 2 * Math.PI); ctx.fill();
      ctx.fillStyle = "#eee"; ctx.font = "12px sans-serif";
      ctx.fillText(n.data.id + ": " + n.data.label, n.x + 16, n.y + 4);
    });
  }

  var ticks = 0;
  (function loop() {
    step(); draw();
    if (++ticks < 400) requestAnimationFrame(loop);
  })();
})();
</script>
</body>
</html>
"##;

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Keeps the payload inert inside the script element.
///
/// Markup characters only occur inside JSON strings, where the `\uXXXX`
/// forms decode to the same text.
fn escape_script(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

pub fn render(view: &GraphView, request: &ReportRequest) -> String {
    let payload = json::render(view, request);
    let title = escape_html(&format!("Dependency Graph: {}", view.tag));
    let summary = escape_html(&format!(
        "{} tasks, {} dependencies, {} on the critical path",
        view.nodes.len(),
        view.edges.len(),
        view.critical_path.len()
    ));

    let mut out = PAGE_HEAD.replace("{{TITLE}}", &title).replace("{{SUMMARY}}", &summary);
    out.push_str(&escape_script(&payload.to_string()));
    out.push_str(PAGE_TAIL);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::TaskCollection;
    use crate::config::AnalysisConfig;
    use crate::types::Task;

    #[test]
    fn embeds_payload_without_breaking_out_of_script() {
        let collection = TaskCollection::from_tasks(vec![
            Task::new("1", "</script><b>x</b>"),
            Task::new("2", "Second").with_dependencies(["1"]),
        ]);
        let request = ReportRequest::new("master");
        let view = GraphView::build(&collection, &request, &AnalysisConfig::default()).unwrap();
        let page = render(&view, &request);

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Dependency Graph: master</title>"));
        // Only the two real script elements close.
        assert_eq!(page.matches("</script>").count(), 2);

        let embedded = embedded_payload(&page);
        assert_eq!(embedded["edges"].as_array().unwrap().len(), 1);
        assert_eq!(embedded["nodes"][0]["label"], "</script><b>x</b>");
    }

    fn embedded_payload(page: &str) -> serde_json::Value {
        let start = page.find("id=\"graph-data\">").unwrap() + "id=\"graph-data\">".len();
        let end = start + page[start..].find("</script>").unwrap();
        serde_json::from_str(&page[start..end]).unwrap()
    }

    #[test]
    fn comment_openers_in_labels_are_escaped() {
        let collection = TaskCollection::from_tasks(vec![Task::new("1", "<!-- <script> & more")]);
        let request = ReportRequest::new("master");
        let view = GraphView::build(&collection, &request, &AnalysisConfig::default()).unwrap();
        let page = render(&view, &request);

        assert!(!page.contains("<!--"));
        assert!(!page.contains("<script> &"));
        assert_eq!(embedded_payload(&page)["nodes"][0]["label"], "<!-- <script> & more");
    }

    #[test]
    fn templates_hold_the_whole_page() {
        assert!(PAGE_HEAD.starts_with("<!DOCTYPE html>"));
        assert!(PAGE_HEAD.ends_with("id=\"graph-data\">"));
        assert!(PAGE_TAIL.starts_with("</script>"));
        assert!(PAGE_TAIL.contains("\"#d00000\""));
        assert!(PAGE_TAIL.contains("requestAnimationFrame(loop)"));
        assert!(PAGE_TAIL.trim_end().ends_with("</html>"));
    }
}
