use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use super::{
    API_SIGNAL_HEADERS, DiscoveredEndpoint, DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy,
    ProbeCatalog, ProbeKind, StrategyKind, confirms_existence,
};
use crate::error::Result;
use crate::models::{Header, Source};

/// The API-signal headers (CORS, versioning, rate limiting) in a response.
pub fn api_signal_headers(headers: &HashMap<String, String>) -> Vec<Header> {
    API_SIGNAL_HEADERS
        .iter()
        .filter_map(|name| {
            headers.get(*name).map(|value| Header {
                name: name.to_string(),
                value: value.clone(),
            })
        })
        .collect()
}

/// Looks for API-signal headers on the conventional API roots.
pub struct SecurityHeaderStrategy;

#[async_trait]
impl DiscoveryStrategy for SecurityHeaderStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SecurityHeaders
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome> {
        let urls = ProbeCatalog::api_roots()
            .iter()
            .filter_map(|p| ctx.url_for(p))
            .collect();

        let mut outcome = DiscoveryOutcome::default();
        for (url, response) in ctx.probe_all(urls, ProbeKind::Get, confirms_existence).await {
            let signals = api_signal_headers(&response.headers);
            let is_json = response
                .content_type()
                .map(|ct| ct.contains("json"))
                .unwrap_or(false);

            if signals.is_empty() && !is_json {
                continue;
            }

            debug!("[SecurityHeaders] {} carries {} API signals", url, signals.len());
            let mut endpoint = DiscoveredEndpoint::from_probe(&url, &response, Source::Probe);
            endpoint.headers = signals;
            outcome.endpoints.push(endpoint);
            outcome.seeds.push(url);
        }
        Ok(outcome)
    }
}
