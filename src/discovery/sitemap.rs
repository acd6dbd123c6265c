use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use tracing::debug;
use url::Url;

use super::{DiscoveredEndpoint, DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, ProbeKind, StrategyKind};
use crate::error::Result;
use crate::extractor::{looks_like_api, sitemap_locations};
use crate::models::{HttpMethod, Source};

const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];
const MAX_SITEMAPS: usize = 25;

pub struct SitemapStrategy;

#[async_trait]
impl DiscoveryStrategy for SitemapStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Sitemap
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome> {
        let start = SITEMAP_PATHS.iter().filter_map(|p| ctx.url_for(p)).collect();
        Ok(read_sitemaps(ctx, start).await)
    }
}

/// Walks sitemaps and sitemap indexes breadth-first.
pub(crate) async fn read_sitemaps(ctx: &DiscoveryContext, start: Vec<Url>) -> DiscoveryOutcome {
    let mut outcome = DiscoveryOutcome::default();
    let mut queue: VecDeque<Url> = start.into_iter().collect();
    let mut seen: HashSet<String> = HashSet::new();

    while let Some(sitemap) = queue.pop_front() {
        if ctx.is_stopped() {
            break;
        }
        if seen.len() >= MAX_SITEMAPS || !seen.insert(sitemap.to_string()) {
            continue;
        }

        let Some(response) = ctx.probe(&sitemap, ProbeKind::Get).await else {
            continue;
        };
        if !response.is_success() {
            continue;
        }

        let is_index = response.body.contains("<sitemapindex");
        let locations = sitemap_locations(&response.body);
        debug!("[Sitemap] {} lists {} locations", sitemap, locations.len());

        for loc in locations {
            let Ok(url) = sitemap.join(&loc) else {
                continue;
            };

            if is_index || (url.path().ends_with(".xml") && url.path().contains("sitemap")) {
                queue.push_back(url);
                continue;
            }

            if looks_like_api(url.as_str()) {
                outcome
                    .endpoints
                    .push(DiscoveredEndpoint::new(url.as_str(), HttpMethod::Get, Source::Sitemap));
            }
            outcome.seeds.push(url);
        }
    }

    outcome
}
