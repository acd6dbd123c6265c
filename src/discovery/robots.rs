use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::sitemap::read_sitemaps;
use super::{DiscoveredEndpoint, DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, ProbeKind, StrategyKind};
use crate::error::Result;
use crate::extractor::looks_like_api;
use crate::models::{HttpMethod, Source};

/// Rules from the `User-agent: *` groups of a robots.txt, plus every
/// `Sitemap:` directive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    pub disallow: Vec<String>,
    pub allow: Vec<String>,
    pub sitemaps: Vec<String>,
}

impl RobotsRules {
    pub fn parse(text: &str) -> Self {
        let mut rules = RobotsRules::default();
        let mut applies = false;
        let mut in_agent_block = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // consecutive user-agent lines share one group
                    if !in_agent_block {
                        applies = false;
                    }
                    in_agent_block = true;
                    applies |= value == "*";
                }
                "disallow" if applies && !value.is_empty() => {
                    in_agent_block = false;
                    rules.disallow.push(value.to_string());
                }
                "allow" if applies && !value.is_empty() => {
                    in_agent_block = false;
                    rules.allow.push(value.to_string());
                }
                "sitemap" => rules.sitemaps.push(value.to_string()),
                _ => in_agent_block = false,
            }
        }

        rules
    }

    /// Disallow prefixes not re-opened by an identical Allow rule.
    pub fn effective_disallow(&self) -> Vec<String> {
        self.disallow
            .iter()
            .filter(|d| !self.allow.contains(d))
            .cloned()
            .collect()
    }

    /// Every concrete path mentioned by an Allow or Disallow rule.
    pub fn paths(&self) -> Vec<String> {
        self.disallow
            .iter()
            .chain(self.allow.iter())
            .filter_map(|rule| {
                let path = rule.trim_end_matches('$').trim_end_matches('*');
                if path.len() <= 1 || path.contains('*') {
                    None
                } else {
                    Some(path.to_string())
                }
            })
            .collect()
    }
}

pub struct RobotsStrategy;

#[async_trait]
impl DiscoveryStrategy for RobotsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Robots
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome> {
        let mut outcome = DiscoveryOutcome::default();

        let Some(robots_url) = ctx.url_for("/robots.txt") else {
            return Ok(outcome);
        };
        let Some(response) = ctx.probe(&robots_url, ProbeKind::Get).await else {
            return Ok(outcome);
        };
        if !response.is_success() {
            debug!("[Robots] no robots.txt ({})", response.status);
            return Ok(outcome);
        }

        let rules = RobotsRules::parse(&response.body);
        debug!(
            "[Robots] {} disallow, {} allow, {} sitemaps",
            rules.disallow.len(),
            rules.allow.len(),
            rules.sitemaps.len()
        );

        for path in rules.paths() {
            let Some(url) = ctx.url_for(&path) else {
                continue;
            };
            if looks_like_api(url.as_str()) {
                outcome
                    .endpoints
                    .push(DiscoveredEndpoint::new(url.as_str(), HttpMethod::Get, Source::RobotsTxt));
            }
            outcome.seeds.push(url);
        }

        let sitemaps: Vec<Url> = rules
            .sitemaps
            .iter()
            .filter_map(|s| robots_url.join(s).ok())
            .collect();
        outcome.merge(read_sitemaps(ctx, sitemaps).await);

        outcome.disallowed = rules.effective_disallow();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
User-agent: Googlebot
Disallow: /private-google/

User-agent: *
Disallow: /admin/
Disallow: /api/internal/  # keep out
Allow: /api/public/
Disallow: /search*
Disallow:

Sitemap: https://example.com/sitemap-main.xml
";

    #[test]
    fn test_parse_only_wildcard_group() {
        let rules = RobotsRules::parse(ROBOTS);
        assert_eq!(rules.disallow, vec!["/admin/", "/api/internal/", "/search*"]);
        assert_eq!(rules.allow, vec!["/api/public/"]);
        assert_eq!(rules.sitemaps, vec!["https://example.com/sitemap-main.xml"]);
    }

    #[test]
    fn test_shared_agent_group() {
        let rules = RobotsRules::parse("User-agent: bingbot\nUser-agent: *\nDisallow: /x\n");
        assert_eq!(rules.disallow, vec!["/x"]);
    }

    #[test]
    fn test_paths_strip_wildcards() {
        let rules = RobotsRules::parse(ROBOTS);
        let paths = rules.paths();
        assert!(paths.contains(&"/search".to_string()));
        assert!(paths.contains(&"/api/public/".to_string()));
    }

    #[test]
    fn test_allow_reopens_disallow() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /a\nAllow: /a\nDisallow: /b\n");
        assert_eq!(rules.effective_disallow(), vec!["/b"]);
    }
}
