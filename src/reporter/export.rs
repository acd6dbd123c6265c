use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use tera::{Context as TeraContext, Tera};

use crate::models::{CrawlResult, RiskLevel};

pub struct JsonExporter;

impl JsonExporter {
    pub fn export(result: &CrawlResult, path: &str) -> Result<()> {
        let output = ExportData {
            scan_time: Utc::now().to_rfc3339(),
            result: result.clone(),
        };

        let json = serde_json::to_string_pretty(&output)?;
        fs::write(path, json).with_context(|| format!("Failed to write to {}", path))?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<CrawlResult> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path))?;

        let data: ExportData = serde_json::from_str(&content)
            .with_context(|| format!("{} is not an apiscout export", path))?;
        Ok(data.result)
    }
}

pub struct HtmlExporter;

impl HtmlExporter {
    pub fn render(result: &CrawlResult) -> Result<String> {
        let mut tera = Tera::default();
        tera.add_raw_template("report", TEMPLATE)?;

        let count = |level: RiskLevel| result.stats.by_risk.get(&level).copied().unwrap_or(0);

        let mut context = TeraContext::new();
        context.insert("domain", &result.domain);
        context.insert("scan_time", &Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string());
        context.insert("total_endpoints", &result.endpoints.len());
        context.insert("total_pages", &result.total_pages);
        context.insert("error_count", &result.errors.len());
        context.insert("critical_count", &count(RiskLevel::Critical));
        context.insert("high_count", &count(RiskLevel::High));
        context.insert("medium_count", &count(RiskLevel::Medium));
        context.insert("low_count", &count(RiskLevel::Low));

        let rows: Vec<HtmlRow> = result
            .endpoints
            .iter()
            .map(|e| HtmlRow {
                method: e.method.to_string(),
                url: e.url.clone(),
                source: e.source.to_string(),
                status: e
                    .response
                    .map(|r| r.status.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                parameters: e.parameters.iter().map(|p| p.name.clone()).collect(),
                has_auth: e.security.has_auth,
                risk: e.security.risk_level.to_string(),
                findings: e
                    .security
                    .vulnerabilities
                    .iter()
                    .map(|v| FindingRow {
                        vuln_type: v.vuln_type.to_string(),
                        description: v.description.clone(),
                    })
                    .collect(),
            })
            .collect();
        context.insert("rows", &rows);

        Ok(tera.render("report", &context)?)
    }

    pub fn export(result: &CrawlResult, path: &str) -> Result<()> {
        let html = Self::render(result)?;
        fs::write(path, html).with_context(|| format!("Failed to write to {}", path))?;
        Ok(())
    }
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>API Inventory: {{ domain }}</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0d1117; color: #c9d1d9; line-height: 1.6; }
        .container { max-width: 1280px; margin: 0 auto; padding: 2rem; }
        h1 { color: #58a6ff; margin-bottom: 0.5rem; }
        .subtitle { color: #8b949e; margin-bottom: 2rem; }
        .summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 1rem; margin-bottom: 2rem; }
        .stat { background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; text-align: center; }
        .stat-value { font-size: 2rem; font-weight: bold; }
        .stat-label { color: #8b949e; font-size: 0.875rem; }
        .critical .stat-value, .high .stat-value { color: #f85149; }
        .medium .stat-value { color: #d29922; }
        .low .stat-value { color: #3fb950; }
        table { width: 100%; border-collapse: collapse; background: #161b22; border: 1px solid #30363d; }
        th, td { padding: 0.6rem 0.9rem; text-align: left; border-bottom: 1px solid #30363d; vertical-align: top; }
        th { background: #21262d; font-weight: 600; }
        tr:hover { background: #21262d; }
        .method { font-family: monospace; font-weight: 600; color: #d2a8ff; }
        .url { font-family: monospace; word-break: break-all; }
        .params { color: #8b949e; font-size: 0.8rem; }
        .risk { padding: 0.2rem 0.5rem; border-radius: 4px; font-size: 0.75rem; font-weight: 600; text-transform: uppercase; }
        .risk.critical, .risk.high { background: #f8514933; color: #f85149; }
        .risk.medium { background: #d2992233; color: #d29922; }
        .risk.low { background: #3fb95033; color: #3fb950; }
        .finding { font-size: 0.8rem; color: #8b949e; }
        .finding-type { color: #f0883e; }
    </style>
</head>
<body>
    <div class="container">
        <h1>API Inventory: {{ domain }}</h1>
        <p class="subtitle">Generated: {{ scan_time }} &middot; {{ total_pages }} pages crawled &middot; {{ error_count }} errors</p>

        <div class="summary">
            <div class="stat"><div class="stat-value">{{ total_endpoints }}</div><div class="stat-label">Endpoints</div></div>
            <div class="stat critical"><div class="stat-value">{{ critical_count }}</div><div class="stat-label">Critical</div></div>
            <div class="stat high"><div class="stat-value">{{ high_count }}</div><div class="stat-label">High</div></div>
            <div class="stat medium"><div class="stat-value">{{ medium_count }}</div><div class="stat-label">Medium</div></div>
            <div class="stat low"><div class="stat-value">{{ low_count }}</div><div class="stat-label">Low</div></div>
        </div>

        <table>
            <thead>
                <tr><th>Method</th><th>URL</th><th>Source</th><th>Status</th><th>Risk</th></tr>
            </thead>
            <tbody>
                {% for row in rows %}
                <tr>
                    <td class="method">{{ row.method }}</td>
                    <td>
                        <div class="url">{{ row.url }}</div>
                        {% if row.parameters %}<div class="params">params: {{ row.parameters | join(sep=", ") }}</div>{% endif %}
                        {% for finding in row.findings %}
                        <div class="finding"><span class="finding-type">{{ finding.vuln_type }}:</span> {{ finding.description }}</div>
                        {% endfor %}
                    </td>
                    <td>{{ row.source }}{% if row.has_auth %} &middot; auth{% endif %}</td>
                    <td>{{ row.status }}</td>
                    <td><span class="risk {{ row.risk }}">{{ row.risk }}</span></td>
                </tr>
                {% endfor %}
            </tbody>
        </table>
    </div>
</body>
</html>"#;

#[derive(serde::Serialize, serde::Deserialize)]
struct ExportData {
    scan_time: String,
    result: CrawlResult,
}

#[derive(serde::Serialize)]
struct HtmlRow {
    method: String,
    url: String,
    source: String,
    status: String,
    parameters: Vec<String>,
    has_auth: bool,
    risk: String,
    findings: Vec<FindingRow>,
}

#[derive(serde::Serialize)]
struct FindingRow {
    vuln_type: String,
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrawlStats;

    fn empty_result() -> CrawlResult {
        CrawlResult {
            domain: "example.com".to_string(),
            endpoints: Vec::new(),
            total_pages: 3,
            elapsed_ms: 1200,
            errors: Vec::new(),
            stats: CrawlStats::default(),
        }
    }

    #[test]
    fn test_html_mentions_domain() {
        let html = HtmlExporter::render(&empty_result()).unwrap();
        assert!(html.contains("API Inventory: example.com"));
        assert!(html.contains("3 pages crawled"));
    }

    #[test]
    fn test_json_export_loads_back() {
        let path = std::env::temp_dir().join(format!("apiscout-{}.json", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();

        JsonExporter::export(&empty_result(), &path).unwrap();
        let loaded = JsonExporter::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.domain, "example.com");
        assert_eq!(loaded.total_pages, 3);
    }
}
