use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;

use crate::discovery::StrategyKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    /// Flat queue; only `max_pages` bounds the crawl.
    #[default]
    Breadth,
    /// Links deeper than `max_depth` are never admitted.
    DepthLimited,
}

/// Per-session crawl configuration. Immutable once a session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub max_depth: usize,
    pub max_pages: usize,
    pub respect_robots: bool,
    pub include_external_links: bool,
    /// Milliseconds to wait before each crawl fetch.
    pub crawl_delay: u64,
    pub user_agent: String,
    pub enable_javascript: bool,
    /// Per-request timeout in milliseconds.
    pub timeout: u64,
    pub concurrency: usize,
    pub requests_per_second: u32,
    pub crawl_mode: CrawlMode,
    pub strategies: BTreeSet<StrategyKind>,
    pub max_predictions: usize,
    pub json_walk_depth: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_pages: 2000,
            respect_robots: false,
            include_external_links: true,
            crawl_delay: 100,
            user_agent: format!("apiscout/{}", env!("CARGO_PKG_VERSION")),
            enable_javascript: true,
            timeout: 10_000,
            concurrency: 16,
            requests_per_second: 20,
            crawl_mode: CrawlMode::Breadth,
            strategies: StrategyKind::all().into_iter().collect(),
            max_predictions: 40,
            json_walk_depth: 32,
        }
    }
}

impl ScannerConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: ScannerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config in {}", path))?;

        Ok(config)
    }

    /// Clamps every numeric knob into a range the engine can run with.
    pub fn sanitized(mut self) -> Self {
        self.max_depth = self.max_depth.clamp(1, 64);
        self.max_pages = self.max_pages.clamp(1, 100_000);
        self.crawl_delay = self.crawl_delay.min(60_000);
        self.timeout = self.timeout.clamp(100, 300_000);
        self.concurrency = self.concurrency.clamp(1, 256);
        self.requests_per_second = self.requests_per_second.clamp(1, 10_000);
        self.max_predictions = self.max_predictions.min(1_000);
        self.json_walk_depth = self.json_walk_depth.clamp(1, 256);
        if self.user_agent.trim().is_empty() {
            self.user_agent = Self::default().user_agent;
        }
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn crawl_delay_duration(&self) -> Duration {
        Duration::from_millis(self.crawl_delay)
    }

    pub fn strategy_enabled(&self, kind: StrategyKind) -> bool {
        self.strategies.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.max_pages, 2000);
        assert_eq!(config.crawl_delay, 100);
        assert_eq!(config.timeout, 10_000);
        assert!(!config.respect_robots);
        assert!(config.include_external_links);
        assert!(config.enable_javascript);
        assert_eq!(config.concurrency, 16);
        assert_eq!(config.strategies.len(), StrategyKind::all().len());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{"max_pages": 5, "enable_javascript": false}"#).unwrap();
        assert_eq!(config.max_pages, 5);
        assert!(!config.enable_javascript);
        assert_eq!(config.max_depth, 8);
    }

    #[test]
    fn test_sanitized_clamps() {
        let config = ScannerConfig {
            max_pages: 0,
            concurrency: 0,
            timeout: 1,
            user_agent: "  ".to_string(),
            ..ScannerConfig::default()
        }
        .sanitized();

        assert_eq!(config.max_pages, 1);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.timeout, 100);
        assert!(config.user_agent.starts_with("apiscout/"));
    }
}
