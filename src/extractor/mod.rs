//! Turns fetched content into endpoint candidates and outbound links.

mod heuristics;
mod json_walk;
mod patterns;

pub use heuristics::{
    NON_CONTENT_EXTENSIONS, confidence, host_suggests_api, is_non_content, is_script_asset,
    looks_like_api, mentions_auth,
};
pub use json_walk::JsonWalker;
pub use patterns::{PatternMatch, PatternMatcher, RegexPatternMatcher};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use tracing::debug;
use url::Url;

use crate::models::{HttpMethod, Parameter, Source};

/// A (method, URL) pair pulled out of content, not yet registered.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointCandidate {
    pub url: String,
    pub method: HttpMethod,
    pub source: Source,
    /// Parameters known from context (form fields) on top of those the URL implies.
    pub parameters: Vec<Parameter>,
    pub confidence: f64,
}

impl EndpointCandidate {
    pub fn new(url: impl Into<String>, method: HttpMethod, source: Source) -> Self {
        Self {
            url: url.into(),
            method,
            source,
            parameters: Vec::new(),
            confidence: confidence(1, 1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub candidates: Vec<EndpointCandidate>,
    pub links: Vec<String>,
    /// External script references, analysed after the crawl.
    pub scripts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Script,
    Json,
    Xml,
    Text,
}

impl ContentKind {
    pub fn detect(content_type: Option<&str>, url: &str, body: &str) -> Self {
        if let Some(ct) = content_type.map(|c| c.to_ascii_lowercase()) {
            if ct.contains("html") {
                return ContentKind::Html;
            }
            if ct.contains("javascript") || ct.contains("ecmascript") {
                return ContentKind::Script;
            }
            if ct.contains("json") {
                return ContentKind::Json;
            }
            if ct.contains("xml") {
                return ContentKind::Xml;
            }
        }

        if is_script_asset(url) {
            return ContentKind::Script;
        }

        let head: String = body.trim_start().chars().take(256).collect::<String>().to_ascii_lowercase();
        if head.starts_with('{') || head.starts_with('[') {
            ContentKind::Json
        } else if head.starts_with("<?xml") || head.starts_with("<urlset") || head.starts_with("<sitemapindex") {
            ContentKind::Xml
        } else if head.starts_with("<!doctype html") || head.contains("<html") {
            ContentKind::Html
        } else {
            ContentKind::Text
        }
    }
}

static LOC_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*([^<\s]+)\s*</loc>").expect("loc pattern"));

/// `<loc>` entries of a sitemap or sitemap index.
pub fn sitemap_locations(xml: &str) -> Vec<String> {
    LOC_TAG
        .captures_iter(xml)
        .map(|caps| caps[1].replace("&amp;", "&"))
        .collect()
}

/// Resolves `raw` against `base`. Unresolvable input yields `None`.
pub fn resolve_url(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') || raw.contains("${") {
        return None;
    }
    let mut url = base.join(raw).ok()?;
    url.set_fragment(None);
    Some(url)
}

/// Groups repeated sightings of one (method, URL) so confidence reflects them.
#[derive(Default)]
struct CandidateSet {
    order: Vec<(HttpMethod, String)>,
    entries: HashMap<(HttpMethod, String), (EndpointCandidate, HashSet<&'static str>, usize)>,
}

impl CandidateSet {
    fn add(&mut self, candidate: EndpointCandidate, pattern: &'static str) {
        let key = (candidate.method, candidate.url.clone());
        match self.entries.get_mut(&key) {
            Some((existing, patterns, count)) => {
                patterns.insert(pattern);
                *count += 1;
                for param in candidate.parameters {
                    if !existing.parameters.iter().any(|p| p.name == param.name) {
                        existing.parameters.push(param);
                    }
                }
            }
            None => {
                self.order.push(key.clone());
                self.entries
                    .insert(key, (candidate, HashSet::from([pattern]), 1));
            }
        }
    }

    fn into_candidates(mut self) -> Vec<EndpointCandidate> {
        self.order
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .map(|(mut candidate, patterns, count)| {
                candidate.confidence = confidence(patterns.len(), count);
                candidate
            })
            .collect()
    }
}

struct Selectors {
    anchor: Selector,
    form: Selector,
    form_field: Selector,
    script_src: Selector,
    inline_script: Selector,
    data_url: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            anchor: Selector::parse("a[href], area[href]").unwrap(),
            form: Selector::parse("form").unwrap(),
            form_field: Selector::parse("input[name], textarea[name], select[name]").unwrap(),
            script_src: Selector::parse("script[src]").unwrap(),
            inline_script: Selector::parse("script:not([src])").unwrap(),
            data_url: Selector::parse(
                "[data-url], [data-api], [data-endpoint], [data-href], [data-action]",
            )
            .unwrap(),
        }
    }
}

const DATA_URL_ATTRS: &[&str] = &["data-url", "data-api", "data-endpoint", "data-href", "data-action"];

/// Stateless content extractor. The pattern matcher is injected so tests can
/// substitute their own.
pub struct ContentExtractor {
    matcher: Arc<dyn PatternMatcher>,
    walker: JsonWalker,
    selectors: Selectors,
}

impl ContentExtractor {
    pub fn new(matcher: Arc<dyn PatternMatcher>, json_depth: usize) -> Self {
        Self {
            matcher,
            walker: JsonWalker::new(json_depth),
            selectors: Selectors::new(),
        }
    }

    pub fn extract(&self, content: &str, content_type: Option<&str>, base_url: &Url) -> Extraction {
        match ContentKind::detect(content_type, base_url.as_str(), content) {
            ContentKind::Html => self.extract_html(content, base_url),
            ContentKind::Script => Extraction {
                candidates: self.extract_script(content, base_url, Source::ScriptAnalysis),
                ..Extraction::default()
            },
            ContentKind::Json => Extraction {
                candidates: self.extract_json(content, base_url, Source::CrawledLink),
                ..Extraction::default()
            },
            ContentKind::Xml => self.extract_xml(content, base_url),
            ContentKind::Text => Extraction {
                candidates: self.extract_script(content, base_url, Source::CrawledLink),
                ..Extraction::default()
            },
        }
    }

    pub fn extract_html(&self, html: &str, base_url: &Url) -> Extraction {
        let document = Html::parse_document(html);
        let mut set = CandidateSet::default();
        let mut links = Vec::new();
        let mut scripts = Vec::new();

        for element in document.select(&self.selectors.anchor) {
            let Some(url) = element.value().attr("href").and_then(|h| resolve_url(base_url, h)) else {
                continue;
            };
            if looks_like_api(url.as_str()) {
                set.add(
                    EndpointCandidate::new(url.as_str(), HttpMethod::Get, Source::HtmlFormOrLink),
                    "anchor",
                );
            }
            links.push(url.to_string());
        }

        for form in document.select(&self.selectors.form) {
            if let Some(candidate) = self.form_candidate(form, base_url) {
                set.add(candidate, "form");
            }
        }

        for element in document.select(&self.selectors.data_url) {
            for attr in DATA_URL_ATTRS {
                let Some(url) = element.value().attr(attr).and_then(|v| resolve_url(base_url, v)) else {
                    continue;
                };
                if looks_like_api(url.as_str()) {
                    set.add(
                        EndpointCandidate::new(url.as_str(), HttpMethod::Get, Source::HtmlFormOrLink),
                        "data-attribute",
                    );
                }
            }
        }

        for element in document.select(&self.selectors.script_src) {
            if let Some(url) = element.value().attr("src").and_then(|s| resolve_url(base_url, s)) {
                scripts.push(url.to_string());
            }
        }

        for element in document.select(&self.selectors.inline_script) {
            let text: String = element.text().collect();
            if text.trim().is_empty() {
                continue;
            }
            let script_type = element.value().attr("type").unwrap_or("").to_ascii_lowercase();
            let candidates = if script_type.contains("json") {
                self.extract_json(&text, base_url, Source::ScriptAnalysis)
            } else {
                self.extract_script(&text, base_url, Source::ScriptAnalysis)
            };
            for candidate in candidates {
                set.add(candidate, "inline-script");
            }
        }

        let candidates = set.into_candidates();
        debug!(
            "[Extractor] {}: {} candidates, {} links, {} scripts",
            base_url,
            candidates.len(),
            links.len(),
            scripts.len()
        );

        Extraction {
            candidates,
            links,
            scripts,
        }
    }

    fn form_candidate(&self, form: ElementRef, base_url: &Url) -> Option<EndpointCandidate> {
        let action = form
            .value()
            .attr("action")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(base_url.as_str());
        let url = resolve_url(base_url, action)?;

        if !looks_like_api(url.as_str()) {
            return None;
        }

        let method = form
            .value()
            .attr("method")
            .and_then(HttpMethod::parse)
            .unwrap_or(HttpMethod::Get);

        let mut candidate = EndpointCandidate::new(url.as_str(), method, Source::HtmlFormOrLink);
        for field in form.select(&self.selectors.form_field) {
            let Some(name) = field.value().attr("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            if candidate.parameters.iter().any(|p| p.name == name) {
                continue;
            }
            let required = field.value().attr("required").is_some();
            let param = if method.requires_body() {
                Parameter::body(name, required)
            } else {
                Parameter {
                    required,
                    ..Parameter::query(name)
                }
            };
            candidate.parameters.push(param);
        }

        Some(candidate)
    }

    /// Scans script (or any free text) for API-shaped call sites.
    pub fn extract_script(&self, text: &str, base_url: &Url, source: Source) -> Vec<EndpointCandidate> {
        let mut set = CandidateSet::default();

        for found in self.matcher.extract_endpoints(text) {
            let Some(url) = resolve_url(base_url, &found.raw) else {
                continue;
            };
            if found.method != HttpMethod::Ws && !looks_like_api(url.as_str()) {
                continue;
            }
            set.add(
                EndpointCandidate::new(url.as_str(), found.method, source),
                found.pattern,
            );
        }

        set.into_candidates()
    }

    /// Walks a JSON payload for string values that resolve to API URLs.
    /// Malformed JSON yields nothing.
    pub fn extract_json(&self, text: &str, base_url: &Url, source: Source) -> Vec<EndpointCandidate> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let strings = self.walker.collect_strings(&value, |s| {
            (s.starts_with('/') || s.starts_with("http://") || s.starts_with("https://"))
                && !s.contains(char::is_whitespace)
        });

        let mut set = CandidateSet::default();
        for raw in strings {
            let Some(url) = resolve_url(base_url, &raw) else {
                continue;
            };
            if looks_like_api(url.as_str()) {
                set.add(EndpointCandidate::new(url.as_str(), HttpMethod::Get, source), "json-value");
            }
        }
        set.into_candidates()
    }

    fn extract_xml(&self, xml: &str, base_url: &Url) -> Extraction {
        let links: Vec<String> = sitemap_locations(xml)
            .iter()
            .filter_map(|loc| resolve_url(base_url, loc))
            .map(|u| u.to_string())
            .collect();

        let mut set = CandidateSet::default();
        for link in &links {
            if looks_like_api(link) {
                set.add(EndpointCandidate::new(link.as_str(), HttpMethod::Get, Source::CrawledLink), "xml-loc");
            }
        }
        for candidate in self.extract_script(xml, base_url, Source::CrawledLink) {
            set.add(candidate, "xml-text");
        }

        Extraction {
            candidates: set.into_candidates(),
            links,
            scripts: Vec::new(),
        }
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(Arc::new(RegexPatternMatcher::new()), 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    const PAGE: &str = r#"
        <!DOCTYPE html>
        <html>
        <body>
            <a href="/api/users">Users</a>
            <a href="/about">About</a>
            <a href="mailto:team@example.com">Mail</a>
            <form action="/api/login" method="POST">
                <input type="text" name="username" required />
                <input type="password" name="password" />
            </form>
            <script src="/static/app.js"></script>
            <script>fetch('/api/v1/orders')</script>
        </body>
        </html>
    "#;

    #[test]
    fn test_detect_content_kind() {
        assert_eq!(ContentKind::detect(Some("text/html; charset=utf-8"), "https://e.com/", ""), ContentKind::Html);
        assert_eq!(ContentKind::detect(Some("application/json"), "https://e.com/x", ""), ContentKind::Json);
        assert_eq!(ContentKind::detect(None, "https://e.com/app.js", "var a;"), ContentKind::Script);
        assert_eq!(ContentKind::detect(None, "https://e.com/x", "  {\"a\":1}"), ContentKind::Json);
        assert_eq!(ContentKind::detect(None, "https://e.com/x", "<?xml version=\"1.0\"?>"), ContentKind::Xml);
        assert_eq!(ContentKind::detect(None, "https://e.com/x", "plain words"), ContentKind::Text);
    }

    #[test]
    fn test_html_page_candidates() {
        let extraction = ContentExtractor::default().extract(PAGE, Some("text/html"), &base());

        let mut pairs: Vec<(HttpMethod, &str, Source)> = extraction
            .candidates
            .iter()
            .map(|c| (c.method, c.url.as_str(), c.source))
            .collect();
        pairs.sort();

        assert_eq!(
            pairs,
            vec![
                (HttpMethod::Get, "https://example.com/api/users", Source::HtmlFormOrLink),
                (HttpMethod::Get, "https://example.com/api/v1/orders", Source::ScriptAnalysis),
                (HttpMethod::Post, "https://example.com/api/login", Source::HtmlFormOrLink),
            ]
        );
    }

    #[test]
    fn test_html_links_and_scripts() {
        let extraction = ContentExtractor::default().extract_html(PAGE, &base());
        assert!(extraction.links.contains(&"https://example.com/api/users".to_string()));
        assert!(extraction.links.contains(&"https://example.com/about".to_string()));
        assert!(extraction.links.iter().any(|l| l.starts_with("mailto:")));
        assert_eq!(extraction.scripts, vec!["https://example.com/static/app.js".to_string()]);
    }

    #[test]
    fn test_form_fields_become_body_params() {
        let extraction = ContentExtractor::default().extract_html(PAGE, &base());
        let login = extraction
            .candidates
            .iter()
            .find(|c| c.method == HttpMethod::Post)
            .unwrap();
        assert_eq!(login.parameters.len(), 2);
        assert_eq!(login.parameters[0], Parameter::body("username", true));
        assert_eq!(login.parameters[1], Parameter::body("password", false));
    }

    #[test]
    fn test_json_payload_urls() {
        let json = r#"{"data": {"next": "/api/items?page=2", "avatar": "/img/a.png", "note": "hello"}}"#;
        let candidates = ContentExtractor::default().extract_json(json, &base(), Source::CrawledLink);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://example.com/api/items?page=2");
    }

    #[test]
    fn test_malformed_json_is_dropped() {
        let candidates = ContentExtractor::default().extract_json("{\"a\": ", &base(), Source::CrawledLink);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_repeated_matches_raise_confidence() {
        let js = r#"
            fetch('/api/orders'); fetch('/api/orders'); fetch('/api/orders');
        "#;
        let candidates = ContentExtractor::default().extract_script(js, &base(), Source::ScriptAnalysis);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].confidence > confidence(1, 1));
    }

    #[test]
    fn test_sitemap_locations() {
        let xml = r#"<urlset><url><loc>https://example.com/a</loc></url>
            <url><loc>
              https://example.com/api/b?x=1&amp;y=2
            </loc></url></urlset>"#;
        assert_eq!(
            sitemap_locations(xml),
            vec!["https://example.com/a", "https://example.com/api/b?x=1&y=2"]
        );
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(&base(), "../api/x#frag").unwrap().as_str(),
            "https://example.com/api/x"
        );
        assert!(resolve_url(&base(), "#top").is_none());
        assert!(resolve_url(&base(), "").is_none());
        assert!(resolve_url(&base(), "http://[::1").is_none());
    }
}
