use regex::Regex;
use url::Url;

use crate::models::{HttpMethod, Parameter};

/// A raw API-shaped string found in script or text content.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub raw: String,
    pub method: HttpMethod,
    pub pattern: &'static str,
}

/// Stateless source-pattern recognizer, injected into the extractor.
pub trait PatternMatcher: Send + Sync {
    fn extract_endpoints(&self, text: &str) -> Vec<PatternMatch>;

    fn extract_parameters(&self, url: &Url) -> Vec<Parameter>;

    /// HTTP methods named in a call-site snippet, in order of appearance.
    fn detect_methods(&self, snippet: &str) -> Vec<HttpMethod>;
}

struct SourcePattern {
    name: &'static str,
    regex: Regex,
    url_group: usize,
    method_group: Option<usize>,
    fixed_method: Option<HttpMethod>,
}

/// Regex-backed matcher covering network-call invocations, `/api/` template
/// literals, parameterised paths and absolute API URLs.
pub struct RegexPatternMatcher {
    patterns: Vec<SourcePattern>,
    method_option: Regex,
    template_expr: Regex,
    path_token: Regex,
}

/// Characters scanned after a call site when looking for a `method:` option.
const METHOD_WINDOW: usize = 240;

impl RegexPatternMatcher {
    pub fn new() -> Self {
        let pattern = |name: &'static str,
                       re: &str,
                       url_group: usize,
                       method_group: Option<usize>,
                       fixed_method: Option<HttpMethod>| SourcePattern {
            name,
            regex: Regex::new(re).unwrap(),
            url_group,
            method_group,
            fixed_method,
        };

        let patterns = vec![
            pattern("fetch", r#"fetch\s*\(\s*["'`]([^"'`\s]+)["'`]"#, 1, None, None),
            pattern(
                "axios-method",
                r#"(?i)axios\s*\.\s*(get|post|put|patch|delete|head|options)\s*\(\s*["'`]([^"'`\s]+)["'`]"#,
                2,
                Some(1),
                None,
            ),
            pattern(
                "axios-config",
                r#"axios\s*\(\s*\{[^}]*?url\s*:\s*["'`]([^"'`\s]+)["'`]"#,
                1,
                None,
                None,
            ),
            pattern(
                "jquery",
                r#"\$\s*\.\s*(ajax|get|post|getJSON)\s*\(\s*["'`]([^"'`\s]+)["'`]"#,
                2,
                Some(1),
                None,
            ),
            pattern(
                "xhr-open",
                r#"(?i)\.open\s*\(\s*["'](get|post|put|patch|delete|head|options)["']\s*,\s*["'`]([^"'`\s]+)["'`]"#,
                2,
                Some(1),
                None,
            ),
            pattern(
                "websocket",
                r#"new\s+WebSocket\s*\(\s*["'`]([^"'`\s]+)["'`]"#,
                1,
                None,
                Some(HttpMethod::Ws),
            ),
            pattern(
                "template-literal",
                r#"`([^`\s]*/(?:api|rest)/[^`\s]*)`"#,
                1,
                None,
                None,
            ),
            pattern(
                "api-path",
                r#"["']((?:/[\w.-]*)*/(?:api|rest|graphql|v\d+)(?:/[^"'\s<>]*)?)["']"#,
                1,
                None,
                None,
            ),
            pattern(
                "param-path",
                r#"["'](/[\w\-/]*(?:\{[A-Za-z_]\w*\}|:[A-Za-z_]\w*)[\w\-/{}:]*)["']"#,
                1,
                None,
                None,
            ),
            pattern(
                "absolute-url",
                r#"["'`]((?:https?|wss?)://[^"'`\s<>]+)["'`]"#,
                1,
                None,
                None,
            ),
        ];

        Self {
            patterns,
            method_option: Regex::new(r#"(?i)(?:method|type)\s*:\s*["'`](get|post|put|patch|delete|head|options)["'`]"#)
                .unwrap(),
            template_expr: Regex::new(r"\$\{\s*(?:[\w$]+\.)*([\w$]+)[^}]*\}").unwrap(),
            path_token: Regex::new(r"\{([A-Za-z_]\w*)\}|:([A-Za-z_]\w*)").unwrap(),
        }
    }

    /// Rewrites `${expr}` placeholders as `{name}` path tokens and drops a
    /// leading placeholder that stands in for a base URL.
    fn normalize_template(&self, raw: &str) -> Option<String> {
        let replaced = self.template_expr.replace_all(raw, "{$1}").into_owned();
        let trimmed = if replaced.starts_with('{') {
            let slash = replaced.find('/')?;
            replaced[slash..].to_string()
        } else {
            replaced
        };
        if trimmed.is_empty() || trimmed.contains('`') {
            None
        } else {
            Some(trimmed)
        }
    }

    fn method_for(&self, pattern: &SourcePattern, caps: &regex::Captures, text: &str) -> HttpMethod {
        if let Some(method) = pattern.fixed_method {
            return method;
        }

        if let Some(group) = pattern.method_group {
            let verb = caps.get(group).map(|m| m.as_str()).unwrap_or("");
            if let Some(method) = HttpMethod::parse(verb) {
                return method;
            }
        }

        // $.ajax, $.getJSON and plain calls: look for a method option after the call
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let window_end = floor_char_boundary(text, end + METHOD_WINDOW);
        self.detect_methods(&text[end..window_end])
            .into_iter()
            .next()
            .unwrap_or(HttpMethod::Get)
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

impl PatternMatcher for RegexPatternMatcher {
    fn extract_endpoints(&self, text: &str) -> Vec<PatternMatch> {
        let mut matches = Vec::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let Some(raw) = caps.get(pattern.url_group) else {
                    continue;
                };

                let Some(normalized) = self.normalize_template(raw.as_str()) else {
                    continue;
                };

                let method = if normalized.starts_with("ws://") || normalized.starts_with("wss://") {
                    HttpMethod::Ws
                } else {
                    self.method_for(pattern, &caps, text)
                };

                matches.push(PatternMatch {
                    raw: normalized,
                    method,
                    pattern: pattern.name,
                });
            }
        }

        matches
    }

    fn extract_parameters(&self, url: &Url) -> Vec<Parameter> {
        let mut params: Vec<Parameter> = Vec::new();

        let path = urlencoding::decode(url.path())
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| url.path().to_string());

        for caps in self.path_token.captures_iter(&path) {
            let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
            if let Some(name) = name {
                if !params.iter().any(|p| p.name == name) {
                    params.push(Parameter::path(name));
                }
            }
        }

        for (key, _) in url.query_pairs() {
            if !params.iter().any(|p| p.name == key) {
                params.push(Parameter::query(key.into_owned()));
            }
        }

        params
    }

    fn detect_methods(&self, snippet: &str) -> Vec<HttpMethod> {
        self.method_option
            .captures_iter(snippet)
            .filter_map(|caps| HttpMethod::parse(&caps[1]))
            .collect()
    }
}

impl Default for RegexPatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}
