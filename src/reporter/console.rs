use colored::Colorize;
use tabled::{Table, Tabled, settings::{Alignment, Modify, Style, object::Rows}};

use crate::models::{CrawlResult, Endpoint, ErrorKind, RiskLevel, VulnType};

pub struct ConsoleReporter;

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Params")]
    params: usize,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Auth")]
    auth: String,
    #[tabled(rename = "Risk")]
    risk: String,
}

const MAX_URL_WIDTH: usize = 80;

fn colored_risk(level: RiskLevel) -> String {
    match level {
        RiskLevel::Critical => "CRITICAL".red().bold().to_string(),
        RiskLevel::High => "HIGH".red().to_string(),
        RiskLevel::Medium => "MEDIUM".yellow().to_string(),
        RiskLevel::Low => "LOW".green().to_string(),
    }
}

fn truncate(url: &str) -> String {
    if url.chars().count() <= MAX_URL_WIDTH {
        return url.to_string();
    }
    let head: String = url.chars().take(MAX_URL_WIDTH - 3).collect();
    format!("{}...", head)
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn print_endpoints(&self, result: &CrawlResult) {
        if result.endpoints.is_empty() {
            println!("\n{}", "No endpoints discovered".yellow());
            return;
        }

        let rows: Vec<TableRow> = result.endpoints.iter().map(Self::row).collect();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();

        println!("\n{}", table);
    }

    fn row(endpoint: &Endpoint) -> TableRow {
        TableRow {
            method: endpoint.method.to_string(),
            url: truncate(&endpoint.url),
            source: endpoint.source.to_string(),
            params: endpoint.parameters.len(),
            status: endpoint
                .response
                .map(|r| r.status.to_string())
                .unwrap_or_else(|| "-".to_string()),
            auth: if endpoint.security.has_auth {
                "yes".cyan().to_string()
            } else {
                String::new()
            },
            risk: colored_risk(endpoint.security.risk_level),
        }
    }

    pub fn print_summary(&self, result: &CrawlResult) {
        let stats = &result.stats;

        println!("\n{}", "Summary".bold().underline());
        println!(
            "{} endpoints on {} pages in {:.2}s ({} requests, {} scripts analysed)",
            result.endpoints.len(),
            result.total_pages,
            result.elapsed_ms as f64 / 1000.0,
            stats.total_requests,
            stats.scripts_analyzed
        );
        println!(
            "{} domains touched, average response {:.0}ms",
            stats.unique_domains, stats.average_response_ms
        );

        if !stats.by_source.is_empty() {
            let sources: Vec<String> = stats
                .by_source
                .iter()
                .map(|(source, count)| format!("{} {}", source, count))
                .collect();
            println!("  {}: {}", "Sources".bold(), sources.join(", "));
        }

        for level in [RiskLevel::Critical, RiskLevel::High, RiskLevel::Medium, RiskLevel::Low] {
            if let Some(count) = stats.by_risk.get(&level).filter(|c| **c > 0) {
                println!("  {}: {}", colored_risk(level), count);
            }
        }

        let failures = |kind: ErrorKind| result.errors.iter().filter(|e| e.kind == kind).count();
        if !result.errors.is_empty() {
            println!(
                "  {}: {} network, {} render, {} strategy",
                "Errors".yellow(),
                failures(ErrorKind::Network),
                failures(ErrorKind::Render),
                failures(ErrorKind::Strategy)
            );
        }
        println!();
    }

    pub fn print_details(&self, result: &CrawlResult) {
        let flagged: Vec<_> = result.endpoints_at_least(RiskLevel::Medium).collect();
        if flagged.is_empty() {
            return;
        }

        println!("\n{}", "Findings".bold().underline());

        for endpoint in flagged {
            println!(
                "\n[{}] {}",
                colored_risk(endpoint.security.risk_level),
                endpoint.display_path().white().bold()
            );

            for vuln in &endpoint.security.vulnerabilities {
                println!("  → {}: {}", vuln.vuln_type.to_string().yellow(), vuln.description);

                let recommendation = Self::get_recommendation(&vuln.vuln_type);
                if !recommendation.is_empty() {
                    println!("    {}: {}", "Fix".cyan(), recommendation);
                }
            }
        }
    }

    fn get_recommendation(vuln_type: &VulnType) -> &'static str {
        match vuln_type {
            VulnType::InsecureTransport => "Serve the endpoint over HTTPS and redirect plain HTTP",
            VulnType::DestructiveMethod => "Confirm DELETE requires authentication and authorization",
            VulnType::CredentialsInUrl => "Move credentials into headers or the request body",
            VulnType::CleartextCredentials => "Never accept credentials over unencrypted transport",
            VulnType::PrivilegedSurface => "Restrict administrative routes to trusted networks",
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_urls() {
        let long = format!("https://example.com/{}", "a".repeat(200));
        let short = truncate(&long);
        assert_eq!(short.chars().count(), MAX_URL_WIDTH);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("https://example.com/api"), "https://example.com/api");
    }
}
