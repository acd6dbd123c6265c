mod classifier;

pub use classifier::SecurityClassifier;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::extractor::{EndpointCandidate, PatternMatcher, looks_like_api};
use crate::models::{Endpoint, Header, HttpMethod, ResponseMeta, Source};

/// Deduplicating endpoint store for one session.
///
/// Identity is `METHOD:url` on the parsed URL string; a later record with the
/// same identity replaces the earlier one.
pub struct EndpointRegistry {
    matcher: Arc<dyn PatternMatcher>,
    classifier: SecurityClassifier,
    endpoints: HashMap<String, Endpoint>,
}

impl EndpointRegistry {
    pub fn new(matcher: Arc<dyn PatternMatcher>) -> Self {
        Self {
            matcher,
            classifier: SecurityClassifier::new(),
            endpoints: HashMap::new(),
        }
    }

    /// Records (or overwrites) an endpoint. `None` if the URL does not parse.
    pub fn record(
        &mut self,
        url: &str,
        method: HttpMethod,
        source: Source,
        depth: usize,
    ) -> Option<Endpoint> {
        let parsed = Url::parse(url).ok()?;
        let url = parsed.to_string();
        let parameters = self.matcher.extract_parameters(&parsed);
        let security = self.classifier.classify(method, &parsed, &parameters);

        let endpoint = Endpoint {
            id: Endpoint::derive_id(method, &url),
            method,
            url,
            parameters,
            headers: Vec::new(),
            depth,
            source,
            response: None,
            security,
        };

        let key = endpoint.key();
        if self.endpoints.insert(key, endpoint.clone()).is_some() {
            debug!("[Registry] replaced {}", endpoint.display_path());
        }
        Some(endpoint)
    }

    /// Acceptance-filtered record of an extracted candidate, merging in the
    /// parameters the candidate carries from its context.
    pub fn admit(&mut self, candidate: &EndpointCandidate, depth: usize) -> Option<Endpoint> {
        if candidate.method != HttpMethod::Ws && !looks_like_api(&candidate.url) {
            return None;
        }

        let mut endpoint = self.record(&candidate.url, candidate.method, candidate.source, depth)?;
        if candidate.parameters.is_empty() {
            return Some(endpoint);
        }

        for param in &candidate.parameters {
            if !endpoint.parameters.iter().any(|p| p.name == param.name) {
                endpoint.parameters.push(param.clone());
            }
        }
        endpoint.security =
            self.classifier
                .classify(endpoint.method, &Url::parse(&endpoint.url).ok()?, &endpoint.parameters);
        self.endpoints.insert(endpoint.key(), endpoint.clone());
        Some(endpoint)
    }

    /// Folds a crawl response into the registry. Known endpoints only gain
    /// response metadata; unknown API-looking URLs are recorded as crawled links.
    pub fn observe(&mut self, url: &str, method: HttpMethod, meta: ResponseMeta, depth: usize) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let key = Endpoint::identity(method, parsed.as_str());

        if let Some(existing) = self.endpoints.get_mut(&key) {
            existing.response = Some(meta);
            return true;
        }

        if !looks_like_api(parsed.as_str()) {
            return false;
        }

        match self.record(parsed.as_str(), method, Source::CrawledLink, depth) {
            Some(endpoint) => {
                if let Some(stored) = self.endpoints.get_mut(&endpoint.key()) {
                    stored.response = Some(meta);
                }
                true
            }
            None => false,
        }
    }

    pub fn attach_headers(&mut self, method: HttpMethod, url: &str, headers: Vec<Header>) {
        let Ok(parsed) = Url::parse(url) else {
            return;
        };
        if let Some(endpoint) = self.endpoints.get_mut(&Endpoint::identity(method, parsed.as_str())) {
            for header in headers {
                if !endpoint.headers.iter().any(|h| h.name == header.name) {
                    endpoint.headers.push(header);
                }
            }
        }
    }

    pub fn get(&self, method: HttpMethod, url: &str) -> Option<&Endpoint> {
        let parsed = Url::parse(url).ok()?;
        self.endpoints.get(&Endpoint::identity(method, parsed.as_str()))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Endpoints sorted by URL, then method.
    pub fn snapshot(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self.endpoints.values().cloned().collect();
        endpoints.sort_by(|a, b| a.url.cmp(&b.url).then(a.method.cmp(&b.method)));
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::RegexPatternMatcher;
    use crate::models::{ParamKind, Parameter, RiskLevel};

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(Arc::new(RegexPatternMatcher::new()))
    }

    #[test]
    fn test_record_rejects_unparseable_url() {
        let mut registry = registry();
        assert!(registry.record("not a url", HttpMethod::Get, Source::Sitemap, 0).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_same_identity_last_write_wins() {
        let mut registry = registry();
        registry.record("https://example.com/api/users", HttpMethod::Get, Source::Sitemap, 0);
        registry.record("https://example.com/api/users", HttpMethod::Get, Source::HtmlFormOrLink, 2);

        assert_eq!(registry.len(), 1);
        let endpoint = registry.get(HttpMethod::Get, "https://example.com/api/users").unwrap();
        assert_eq!(endpoint.source, Source::HtmlFormOrLink);
        assert_eq!(endpoint.depth, 2);
    }

    #[test]
    fn test_method_is_part_of_identity() {
        let mut registry = registry();
        registry.record("https://example.com/api/users", HttpMethod::Get, Source::Sitemap, 0);
        registry.record("https://example.com/api/users", HttpMethod::Delete, Source::Sitemap, 0);
        assert_eq!(registry.len(), 2);

        let delete = registry.get(HttpMethod::Delete, "https://example.com/api/users").unwrap();
        assert_eq!(delete.security.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_path_params_from_braces() {
        let mut registry = registry();
        let endpoint = registry
            .record("https://example.com/api/users/{id}?expand=1", HttpMethod::Get, Source::ScriptAnalysis, 1)
            .unwrap();
        assert_eq!(endpoint.parameters[0], Parameter::path("id"));
        assert_eq!(endpoint.parameters[1].kind, ParamKind::Query);
    }

    #[test]
    fn test_admit_applies_api_filter_and_merges_params() {
        let mut registry = registry();
        let page = EndpointCandidate::new("https://example.com/about", HttpMethod::Get, Source::CrawledLink);
        assert!(registry.admit(&page, 0).is_none());

        let mut form = EndpointCandidate::new("https://example.com/api/login", HttpMethod::Post, Source::HtmlFormOrLink);
        form.parameters.push(Parameter::body("password", true));
        let endpoint = registry.admit(&form, 0).unwrap();
        assert_eq!(endpoint.parameters.len(), 1);
        assert!(endpoint.security.has_auth);
        assert_eq!(registry.get(HttpMethod::Post, "https://example.com/api/login").unwrap().parameters.len(), 1);
    }

    #[test]
    fn test_observe_keeps_source() {
        let mut registry = registry();
        registry.record("https://example.com/api/orders", HttpMethod::Get, Source::ScriptAnalysis, 0);
        let meta = ResponseMeta { status: 200, size: 12, duration_ms: 5 };

        assert!(registry.observe("https://example.com/api/orders", HttpMethod::Get, meta, 1));
        let endpoint = registry.get(HttpMethod::Get, "https://example.com/api/orders").unwrap();
        assert_eq!(endpoint.source, Source::ScriptAnalysis);
        assert_eq!(endpoint.response, Some(meta));

        assert!(!registry.observe("https://example.com/contact", HttpMethod::Get, meta, 1));
        assert!(registry.observe("https://example.com/api/new", HttpMethod::Get, meta, 1));
        assert_eq!(
            registry.get(HttpMethod::Get, "https://example.com/api/new").unwrap().source,
            Source::CrawledLink
        );
    }
}
