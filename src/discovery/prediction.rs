use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

use super::{
    DiscoveredEndpoint, DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, ProbeCatalog,
    ProbeKind, StrategyKind, confirms_existence,
};
use crate::error::Result;
use crate::extractor::confidence;
use crate::models::{Endpoint, HttpMethod, Source};

static VERSION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v\d+(\.\d+)?$").expect("version pattern"));

static NOUN_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z_-]{2,31}$").expect("noun pattern"));

const PREFIX_SEGMENTS: &[&str] = &["api", "rest", "services", "service"];

/// A guessed route with its advisory score.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub url: Url,
    pub resource: String,
    pub confidence: f64,
}

#[derive(Default)]
struct ResourceEvidence {
    prefixes: BTreeSet<String>,
    sources: HashSet<Source>,
    sightings: usize,
}

/// Splits a path into its API prefix (`/api/v2`) and the first resource noun after it.
fn split_resource(path: &str) -> Option<(String, String)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut prefix = String::new();

    for segment in segments {
        let lower = segment.to_ascii_lowercase();
        if PREFIX_SEGMENTS.contains(&lower.as_str()) || VERSION_SEGMENT.is_match(&lower) {
            prefix.push('/');
            prefix.push_str(&lower);
            continue;
        }
        if prefix.is_empty() || !NOUN_SEGMENT.is_match(&lower) {
            return None;
        }
        return Some((prefix, lower));
    }
    None
}

fn swap_version(prefix: &str, version: &str) -> Option<String> {
    let mut changed = false;
    let swapped: Vec<&str> = prefix
        .split('/')
        .map(|segment| {
            if VERSION_SEGMENT.is_match(segment) && segment != version {
                changed = true;
                version
            } else {
                segment
            }
        })
        .collect();
    changed.then(|| swapped.join("/"))
}

/// Ranks CRUD permutations of the resources seen in `known`, best first.
///
/// Routes already present in `known` are never predicted. Item routes use a
/// concrete id so they can be probed as-is.
pub fn predict(base: &Url, known: &[Endpoint], limit: usize) -> Vec<Prediction> {
    let mut evidence: BTreeMap<String, ResourceEvidence> = BTreeMap::new();
    let mut existing: HashSet<String> = HashSet::new();

    for endpoint in known {
        let Ok(url) = Url::parse(&endpoint.url) else {
            continue;
        };
        if url.host_str() != base.host_str() {
            continue;
        }
        existing.insert(url.path().trim_end_matches('/').to_string());

        if let Some((prefix, noun)) = split_resource(url.path()) {
            let entry = evidence.entry(noun).or_default();
            entry.prefixes.insert(prefix);
            entry.sources.insert(endpoint.source);
            entry.sightings += 1;
        }
    }

    let mut predictions = Vec::new();
    let mut emitted: HashSet<String> = HashSet::new();

    for (noun, seen) in &evidence {
        let score = confidence(seen.sources.len() + seen.prefixes.len(), seen.sightings);

        let mut prefixes: BTreeSet<String> = seen.prefixes.clone();
        for prefix in &seen.prefixes {
            for version in ProbeCatalog::version_tokens() {
                if let Some(swapped) = swap_version(prefix, version) {
                    prefixes.insert(swapped);
                }
            }
        }

        for prefix in &prefixes {
            // a guessed version is weaker evidence than one actually seen
            let base_score = if seen.prefixes.contains(prefix) { score } else { score * 0.5 };

            for suffix in ProbeCatalog::crud_suffixes() {
                let path = format!("{}/{}{}", prefix, noun, suffix.replace("{id}", "1"));
                if existing.contains(&path) || !emitted.insert(path.clone()) {
                    continue;
                }
                let Ok(url) = base.join(&path) else {
                    continue;
                };
                let item_penalty = if suffix.is_empty() { 0.0 } else { 0.1 };
                predictions.push(Prediction {
                    url,
                    resource: noun.clone(),
                    confidence: (base_score - item_penalty).clamp(0.0, 1.0),
                });
            }
        }
    }

    predictions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.url.as_str().cmp(b.url.as_str()))
    });
    predictions.truncate(limit);
    predictions
}

/// Probes predicted routes for the resources found so far.
pub struct PredictionStrategy {
    max_predictions: usize,
}

impl PredictionStrategy {
    pub fn new(max_predictions: usize) -> Self {
        Self { max_predictions }
    }
}

#[async_trait]
impl DiscoveryStrategy for PredictionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Prediction
    }

    async fn discover(&self, ctx: &DiscoveryContext) -> Result<DiscoveryOutcome> {
        let predictions = predict(&ctx.base, &ctx.known, self.max_predictions);
        if predictions.is_empty() {
            return Ok(DiscoveryOutcome::default());
        }
        debug!("[Prediction] probing {} predicted routes", predictions.len());

        let scores: BTreeMap<String, f64> = predictions
            .iter()
            .map(|p| (p.url.to_string(), p.confidence))
            .collect();
        let urls = predictions.into_iter().map(|p| p.url).collect();

        let mut outcome = DiscoveryOutcome::default();
        for (url, response) in ctx.probe_all(urls, ProbeKind::Get, confirms_existence).await {
            let mut endpoint = DiscoveredEndpoint::from_probe(&url, &response, Source::Prediction);
            endpoint.method = HttpMethod::Get;
            endpoint.confidence = scores.get(url.as_str()).copied().unwrap_or_default();
            outcome.endpoints.push(endpoint);
        }

        info!("[Prediction] {} predicted routes confirmed", outcome.endpoints.len());
        Ok(outcome)
    }
}
