use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use super::{
    DiscoveredEndpoint, DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, Framework,
    MarkerLocation, ProbeCatalog, ProbeKind, StrategyKind, confirms_existence,
};
use crate::error::{Result, ScoutError};
use crate::extractor::looks_like_api;
use crate::models::Source;

/// Frameworks whose markers appear in the given response headers or body.
/// Header names are expected lowercased.
pub fn detect_frameworks(headers: &HashMap<String, String>, body: &str) -> Vec<Framework> {
    let cookies = headers
        .get("set-cookie")
        .map(|c| c.to_ascii_lowercase())
        .unwrap_or_default();

    ProbeCatalog::frameworks()
        .iter()
        .filter(|profile| {
            profile.markers.iter().any(|marker| match marker {
                MarkerLocation::Header(name, needle) => headers
                    .get(*name)
                    .map(|v| v.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
                    .unwrap_or(false),
                MarkerLocation::Cookie(name) => cookies.contains(&name.to_ascii_lowercase()),
                MarkerLocation::Body(needle) => body.contains(needle),
            })
        })
        .map(|profile| profile.framework)
        .collect()
}

/// Infers the site's framework from its landing page, then probes that
/// framework's idiomatic API routes.
pub struct FingerprintStrategy;

#[async_trait]
impl DiscoveryStrategy for FingerprintStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fingerprint
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome> {
        if ctx.is_stopped() {
            return Ok(DiscoveryOutcome::default());
        }
        let landing = ctx
            .probe(&ctx.base, ProbeKind::Get)
            .await
            .ok_or_else(|| ScoutError::strategy(self.kind().name(), format!("{} unreachable", ctx.base)))?;

        let frameworks = detect_frameworks(&landing.headers, &landing.body);
        if frameworks.is_empty() {
            debug!("[Fingerprint] no framework recognised");
            return Ok(DiscoveryOutcome::default());
        }
        info!(
            "[Fingerprint] detected {}",
            frameworks.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(", ")
        );

        let paths: BTreeSet<&str> = frameworks
            .iter()
            .filter_map(|f| ProbeCatalog::framework(*f))
            .flat_map(|profile| profile.api_paths.iter().copied())
            .collect();
        let urls = paths.into_iter().filter_map(|p| ctx.url_for(p)).collect();

        let mut outcome = DiscoveryOutcome::default();
        for (url, response) in ctx.probe_all(urls, ProbeKind::Get, confirms_existence).await {
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
