use async_trait::async_trait;
use tracing::debug;
use url::{Host, Url};

use super::{
    DiscoveredEndpoint, DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, ProbeCatalog,
    ProbeKind, StrategyKind, confirms_existence,
};
use crate::error::Result;
use crate::extractor::host_suggests_api;
use crate::models::Source;

/// Root URLs of the catalog's API-suggestive subdomains of `base`.
///
/// IP addresses, `localhost` and single-label hosts have no subdomains to guess.
pub fn subdomain_candidates(base: &Url) -> Vec<Url> {
    let Some(Host::Domain(host)) = base.host() else {
        return Vec::new();
    };
    let apex = host.strip_prefix("www.").unwrap_or(host);
    if apex == "localhost" || !apex.contains('.') {
        return Vec::new();
    }

    ProbeCatalog::subdomain_labels()
        .iter()
        .filter_map(|label| {
            let candidate = format!("{}.{}", label, apex);
            if candidate == host {
                return None;
            }
            Url::parse(&format!("{}://{}/", base.scheme(), candidate)).ok()
        })
        .collect()
}

/// Guesses API subdomains; a host that resolves and answers exists.
pub struct SubdomainStrategy;

#[async_trait]
impl DiscoveryStrategy for SubdomainStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Subdomains
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome> {
        let candidates = subdomain_candidates(&ctx.base);
        if candidates.is_empty() {
            return Ok(DiscoveryOutcome::default());
        }

        let found = ctx.probe_all(candidates, ProbeKind::Get, confirms_existence).await;
        debug!("[Subdomains] {} hosts answered", found.len());

        let mut outcome = DiscoveryOutcome::default();
        for (url, response) in found {
            if url.host_str().map(host_suggests_api).unwrap_or(false) {
                outcome
                    .endpoints
                    .push(DiscoveredEndpoint::from_probe(&url, &response, Source::Probe));
            }
            outcome.seeds.push(url);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_for_domain() {
        let base = Url::parse("https://www.example.com/").unwrap();
        let candidates = subdomain_candidates(&base);
        assert_eq!(candidates.len(), ProbeCatalog::subdomain_labels().len());
        assert!(candidates.iter().any(|u| u.as_str() == "https://api.example.com/"));
    }

    #[test]
    fn test_skips_current_host() {
        let base = Url::parse("https://api.example.com/").unwrap();
        let candidates = subdomain_candidates(&base);
        assert!(!candidates.iter().any(|u| u.host_str() == Some("api.example.com")));
    }

    #[test]
    fn test_no_candidates_for_ip_or_localhost() {
        assert!(subdomain_candidates(&Url::parse("http://127.0.0.1:8080/").unwrap()).is_empty());
        assert!(subdomain_candidates(&Url::parse("http://localhost/").unwrap()).is_empty());
    }
}
