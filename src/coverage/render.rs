use std::{fs, path::Path};

use super::{CoverageError, CoverageReport, UnitKind, UnitReport};

pub const HTML_FILE: &str = "index.html";
pub const JSON_FILE: &str = "coverage.json";

/// Writes `index.html` and `coverage.json` for `report` into `out_dir`,
/// creating it if needed. Fails only when the output cannot be written.
pub fn render(report: &CoverageReport, out_dir: &Path) -> Result<(), CoverageError> {
    fs::create_dir_all(out_dir).map_err(|err| CoverageError::output(out_dir, err))?;

    let html_path = out_dir.join(HTML_FILE);
    fs::write(&html_path, render_html(report))
        .map_err(|err| CoverageError::output(&html_path, err))?;

    let json_path = out_dir.join(JSON_FILE);
    let bytes = serde_json::to_vec_pretty(report)
        .map_err(|err| CoverageError::output(&json_path, err.into()))?;
    fs::write(&json_path, bytes).map_err(|err| CoverageError::output(&json_path, err))?;
    Ok(())
}

fn render_html(report: &CoverageReport) -> String {
    let mut s = String::new();
    s.push_str("<!doctype html>\n<html><head><meta charset=\"utf-8\">");
    s.push_str("<title>loam coverage</title>");
    s.push_str("<style>body{font-family:system-ui,Segoe UI,Helvetica,Arial,sans-serif;margin:24px;line-height:1.45}code,pre{background:#f6f8fa;padding:2px 4px;border-radius:4px}table{border-collapse:collapse}td,th{padding:4px 8px;border:1px solid #ddd;text-align:left}h2{margin-top:28px}.hit{background:#e6ffed}.miss{background:#ffeef0}</style>");
    s.push_str("</head><body>");
    s.push_str("<h1>loam coverage</h1>");

    s.push_str("<h2>Summary</h2><table>");
    s.push_str("<tr><th>unit</th><th>kind</th><th>spans hit</th><th>coverage</th></tr>");
    for unit in &report.units {
        s.push_str("<tr><td><a href=\"#");
        s.push_str(&anchor(&unit.unit));
        s.push_str("\"><code>");
        s.push_str(&html_escape(&unit.unit));
        s.push_str("</code></a></td><td>");
        s.push_str(kind_label(unit));
        s.push_str("</td><td>");
        s.push_str(&format!("{}/{}", unit.hit(), unit.instrumented()));
        s.push_str("</td><td>");
        s.push_str(&format!("{:.1}%", unit.percent()));
        s.push_str("</td></tr>");
    }
    s.push_str("<tr><th>total</th><th></th><th>");
    s.push_str(&format!("{}/{}", report.hit(), report.instrumented()));
    s.push_str("</th><th>");
    s.push_str(&format!("{:.1}%", report.percent()));
    s.push_str("</th></tr></table>");

    for unit in &report.units {
        render_unit(&mut s, unit);
    }

    if !report.skipped.is_empty() {
        s.push_str("<h2>Skipped data files</h2><ul>");
        for skipped in &report.skipped {
            s.push_str("<li><code>");
            s.push_str(&html_escape(skipped.path.display().to_string()));
            s.push_str("</code>: ");
            s.push_str(&html_escape(&skipped.reason));
            s.push_str("</li>");
        }
        s.push_str("</ul>");
    }

    s.push_str("</body></html>\n");
    s
}

fn render_unit(s: &mut String, unit: &UnitReport) {
    // Sources from archives or embedded resources have no readable file.
    let source = fs::read_to_string(&unit.source).ok();
    let lines: Vec<&str> = source
        .as_deref()
        .map(|text| text.lines().collect())
        .unwrap_or_default();

    s.push_str("<h2 id=\"");
    s.push_str(&anchor(&unit.unit));
    s.push_str("\"><code>");
    s.push_str(&html_escape(&unit.unit));
    s.push_str("</code></h2>");
    s.push_str("<p>source: <code>");
    s.push_str(&html_escape(&unit.source));
    s.push_str("</code></p>");
    s.push_str("<table><tr><th>span</th><th>hits</th><th>source</th></tr>");
    for span in &unit.spans {
        s.push_str(if span.hits > 0 {
            "<tr class=\"hit\"><td>"
        } else {
            "<tr class=\"miss\"><td>"
        });
        s.push_str(&span.span().to_string());
        s.push_str("</td><td>");
        s.push_str(&span.hits.to_string());
        s.push_str("</td><td><code>");
        let line = (span.line as usize)
            .checked_sub(1)
            .and_then(|index| lines.get(index));
        if let Some(line) = line {
            s.push_str(&html_escape(line.trim_end()));
        }
        s.push_str("</code></td></tr>");
    }
    s.push_str("</table>");
}

fn kind_label(unit: &UnitReport) -> &'static str {
    match unit.kind {
        UnitKind::Module => "module",
        UnitKind::Script => "script",
    }
}

fn anchor(unit: &str) -> String {
    let slug: String = unit
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("unit{slug}")
}

fn html_escape(s: impl AsRef<str>) -> String {
    s.as_ref()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
