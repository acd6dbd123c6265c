use async_trait::async_trait;
use tracing::debug;

use super::{
    DiscoveredEndpoint, DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, ProbeCatalog,
    ProbeKind, StrategyKind,
};
use crate::error::Result;
use crate::extractor::looks_like_api;
use crate::models::Source;

/// HEAD-probes the conventional discovery documents and health endpoints.
pub struct WellKnownStrategy;

#[async_trait]
impl DiscoveryStrategy for WellKnownStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WellKnown
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome> {
        let urls = ProbeCatalog::well_known_paths()
            .iter()
            .filter_map(|p| ctx.url_for(p))
            .collect();

        let found = ctx.probe_all(urls, ProbeKind::Head, |status| status < 400).await;
        debug!("[WellKnown] {} paths answered", found.len());

        let mut outcome = DiscoveryOutcome::default();
        for (url, response) in found {
            if looks_like_api(url.as_str()) {
                outcome
                    .endpoints
                    .push(DiscoveredEndpoint::from_probe(&url, &response, Source::Probe));
            }
            outcome.seeds.push(url);
        }
        Ok(outcome)
    }
}
