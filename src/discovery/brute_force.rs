use async_trait::async_trait;
use tracing::debug;

use super::{
    DiscoveredEndpoint, DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, ProbeCatalog,
    ProbeKind, StrategyKind, confirms_existence,
};
use crate::error::Result;
use crate::extractor::looks_like_api;
use crate::models::Source;

/// GET-probes a fixed list of REST-style paths.
///
/// Anything below 500 is reachable, but only a status that confirms the
/// resource (see [`confirms_existence`]) registers an endpoint, and only a
/// status below 400 seeds the crawl.
pub struct BruteForceStrategy;

#[async_trait]
impl DiscoveryStrategy for BruteForceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BruteForce
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome> {
        let urls = ProbeCatalog::brute_force_paths()
            .iter()
            .filter_map(|p| ctx.url_for(p))
            .collect();

        // the client already fails 5xx responses
        let reachable = ctx.probe_all(urls, ProbeKind::Get, |status| status < 500).await;

        let mut outcome = DiscoveryOutcome::default();
        for (url, response) in reachable {
            if !confirms_existence(response.status) {
                continue;
            }
            if looks_like_api(url.as_str()) {
                outcome
                    .endpoints
                    .push(DiscoveredEndpoint::from_probe(&url, &response, Source::Probe));
            }
            if response.status < 400 {
                outcome.seeds.push(url);
            }
        }
        debug!("[BruteForce] {} paths exist", outcome.endpoints.len());
        Ok(outcome)
    }
}
