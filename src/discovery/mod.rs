//! Independent seed generators run before (and, for prediction, after) the crawl.

mod brute_force;
mod catalog;
mod fingerprint;
mod prediction;
mod robots;
mod security_headers;
mod sitemap;
mod subdomains;
mod well_known;

pub use brute_force::BruteForceStrategy;
pub use catalog::{API_SIGNAL_HEADERS, Framework, FrameworkProfile, MarkerLocation, ProbeCatalog};
pub use fingerprint::{FingerprintStrategy, detect_frameworks};
pub use prediction::{Prediction, PredictionStrategy, predict};
pub use robots::{RobotsRules, RobotsStrategy};
pub use security_headers::{SecurityHeaderStrategy, api_signal_headers};
pub use sitemap::SitemapStrategy;
pub use subdomains::{SubdomainStrategy, subdomain_candidates};
pub use well_known::WellKnownStrategy;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OnceCell, Semaphore};
use tracing::debug;
use url::Url;

use crate::crawler::StopHandle;
use crate::error::Result;
use crate::extractor::resolve_url;
use crate::fetch::Fetcher;
use crate::http::HttpResponse;
use crate::models::{Endpoint, Header, HttpMethod, ResponseMeta, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Sitemap,
    Robots,
    WellKnown,
    BruteForce,
    Fingerprint,
    SecurityHeaders,
    Subdomains,
    Prediction,
}

impl StrategyKind {
    pub fn all() -> Vec<StrategyKind> {
        vec![
            StrategyKind::Sitemap,
            StrategyKind::Robots,
            StrategyKind::WellKnown,
            StrategyKind::BruteForce,
            StrategyKind::Fingerprint,
            StrategyKind::SecurityHeaders,
            StrategyKind::Subdomains,
            StrategyKind::Prediction,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Sitemap => "sitemap",
            StrategyKind::Robots => "robots",
            StrategyKind::WellKnown => "well_known",
            StrategyKind::BruteForce => "brute_force",
            StrategyKind::Fingerprint => "fingerprint",
            StrategyKind::SecurityHeaders => "security_headers",
            StrategyKind::Subdomains => "subdomains",
            StrategyKind::Prediction => "prediction",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Head,
    Get,
}

type Settled = Result<Arc<HttpResponse>>;

/// Every HEAD and GET issued in a session outside the browser, keyed by
/// (kind, URL).
///
/// The first caller performs the request; later callers for the same key
/// await and share its outcome. Discovery probes and static crawl fetches
/// both go through here, so no URL is requested twice with the same method.
#[derive(Default)]
pub struct ProbeLedger {
    entries: Mutex<HashMap<(ProbeKind, String), Arc<OnceCell<Settled>>>>,
}

impl ProbeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, url: &Url, kind: ProbeKind) -> Arc<OnceCell<Settled>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry((kind, url.to_string()))
            .or_default()
            .clone()
    }

    /// Performs the request once per (kind, URL) and hands every caller the same outcome.
    pub async fn fetch(&self, fetcher: &Fetcher, url: &Url, kind: ProbeKind) -> Result<Arc<HttpResponse>> {
        self.cell(url, kind)
            .get_or_init(|| async {
                let result = match kind {
                    ProbeKind::Head => fetcher.probe_head(url.as_str()).await,
                    ProbeKind::Get => fetcher.probe_get(url.as_str()).await,
                };
                result.map(Arc::new)
            })
            .await
            .clone()
    }

    pub async fn probe(&self, fetcher: &Fetcher, url: &Url, kind: ProbeKind) -> Option<Arc<HttpResponse>> {
        match self.fetch(fetcher, url, kind).await {
            Ok(response) => Some(response),
            Err(e) => {
                debug!("[Probe] {}", e);
                None
            }
        }
    }

    /// A response some earlier request already settled, without issuing one.
    pub fn cached(&self, url: &Url, kind: ProbeKind) -> Option<Arc<HttpResponse>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(kind, url.to_string()))
            .and_then(|cell| cell.get())
            .and_then(|settled| settled.as_ref().ok())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared inputs of a strategy run.
pub struct DiscoveryContext {
    pub base: Url,
    pub fetcher: Arc<Fetcher>,
    pub ledger: Arc<ProbeLedger>,
    /// Endpoints registered so far; only prediction reads it.
    pub known: Vec<Endpoint>,
    semaphore: Arc<Semaphore>,
    stop: StopHandle,
}

impl DiscoveryContext {
    pub fn new(base: Url, fetcher: Arc<Fetcher>, ledger: Arc<ProbeLedger>, concurrency: usize) -> Self {
        Self {
            base,
            fetcher,
            ledger,
            known: Vec::new(),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            stop: StopHandle::default(),
        }
    }

    /// Probes issued after `stop` fires are skipped.
    pub fn with_stop(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn with_known(mut self, known: Vec<Endpoint>) -> Self {
        self.known = known;
        self
    }

    pub fn url_for(&self, path: &str) -> Option<Url> {
        resolve_url(&self.base, path)
    }

    pub async fn probe(&self, url: &Url, kind: ProbeKind) -> Option<Arc<HttpResponse>> {
        if self.is_stopped() {
            return None;
        }
        // a closed semaphore only happens on teardown; skip the probe
        let _permit = self.semaphore.acquire().await.ok()?;
        if self.is_stopped() {
            return None;
        }
        self.ledger.probe(&self.fetcher, url, kind).await
    }

    /// Probes every URL with bounded parallelism, keeping the responses `accept` passes.
    pub async fn probe_all<F>(&self, urls: Vec<Url>, kind: ProbeKind, accept: F) -> Vec<(Url, Arc<HttpResponse>)>
    where
        F: Fn(u16) -> bool,
    {
        let futures = urls.into_iter().map(|url| async move {
            let response = self.probe(&url, kind).await;
            (url, response)
        });

        join_all(futures)
            .await
            .into_iter()
            .filter_map(|(url, response)| match response {
                Some(r) if accept(r.status) => Some((url, r)),
                _ => None,
            })
            .collect()
    }
}

/// An endpoint a strategy synthesised directly.
#[derive(Debug, Clone)]
pub struct DiscoveredEndpoint {
    pub url: String,
    pub method: HttpMethod,
    pub source: Source,
    pub headers: Vec<Header>,
    pub response: Option<ResponseMeta>,
    pub confidence: f64,
}

impl DiscoveredEndpoint {
    pub fn new(url: impl Into<String>, method: HttpMethod, source: Source) -> Self {
        Self {
            url: url.into(),
            method,
            source,
            headers: Vec::new(),
            response: None,
            confidence: 1.0,
        }
    }

    pub fn from_probe(url: &Url, response: &HttpResponse, source: Source) -> Self {
        let mut endpoint = Self::new(url.as_str(), HttpMethod::Get, source);
        endpoint.response = Some(ResponseMeta {
            status: response.status,
            size: response.size(),
            duration_ms: response.duration_ms,
        });
        endpoint
    }
}

#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// URLs handed to the frontier.
    pub seeds: Vec<Url>,
    pub endpoints: Vec<DiscoveredEndpoint>,
    /// robots.txt paths the crawler may be asked to avoid.
    pub disallowed: Vec<String>,
}

impl DiscoveryOutcome {
    pub fn merge(&mut self, other: DiscoveryOutcome) {
        self.seeds.extend(other.seeds);
        self.endpoints.extend(other.endpoints);
        self.disallowed.extend(other.disallowed);
    }
}

#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome>;
}

/// Strategies that run during the discovery stage. Prediction is left out:
/// it needs the crawl's findings and runs afterwards.
pub fn initial_strategies(enabled: &BTreeSet<StrategyKind>) -> Vec<Box<dyn DiscoveryStrategy>> {
    let all: Vec<Box<dyn DiscoveryStrategy>> = vec![
        Box::new(SitemapStrategy),
        Box::new(RobotsStrategy),
        Box::new(WellKnownStrategy),
        Box::new(BruteForceStrategy),
        Box::new(FingerprintStrategy),
        Box::new(SecurityHeaderStrategy),
        Box::new(SubdomainStrategy),
    ];

    all.into_iter()
        .filter(|s| enabled.contains(&s.kind()))
        .collect()
}

/// A status below 400, or one that shows the resource exists behind a guard.
pub(crate) fn confirms_existence(status: u16) -> bool {
    status < 400 || matches!(status, 401 | 403 | 405)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_strategies_skip_prediction_and_disabled() {
        let all: BTreeSet<_> = StrategyKind::all().into_iter().collect();
        let kinds: Vec<_> = initial_strategies(&all).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds.len(), 7);
        assert!(!kinds.contains(&StrategyKind::Prediction));

        let only: BTreeSet<_> = [StrategyKind::Robots].into_iter().collect();
        let kinds: Vec<_> = initial_strategies(&only).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![StrategyKind::Robots]);
    }

    #[test]
    fn test_strategy_kind_serde_names() {
        let json = serde_json::to_string(&StrategyKind::BruteForce).unwrap();
        assert_eq!(json, "\"brute_force\"");
        let kind: StrategyKind = serde_json::from_str("\"security_headers\"").unwrap();
        assert_eq!(kind, StrategyKind::SecurityHeaders);
    }

    #[test]
    fn test_confirms_existence() {
        assert!(confirms_existence(200));
        assert!(confirms_existence(301));
        assert!(confirms_existence(401));
        assert!(!confirms_existence(404));
        assert!(!confirms_existence(500));
    }
}
