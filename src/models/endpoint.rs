use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::SecurityAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Ws,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Ws => "WS",
        };
        write!(f, "{}", s)
    }
}

impl HttpMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            "WS" | "WSS" => Some(HttpMethod::Ws),
            _ => None,
        }
    }

    pub fn requires_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

/// Where an endpoint was first (or most recently) recorded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    CrawledLink,
    ScriptAnalysis,
    HtmlFormOrLink,
    Sitemap,
    RobotsTxt,
    Probe,
    Prediction,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::CrawledLink => "crawled-link",
            Source::ScriptAnalysis => "script-analysis",
            Source::HtmlFormOrLink => "html-form-or-link",
            Source::Sitemap => "sitemap",
            Source::RobotsTxt => "robots-txt",
            Source::Probe => "probe",
            Source::Prediction => "prediction",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Query,
    Path,
    Body,
    Header,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
}

impl Parameter {
    pub fn query(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Query,
            required: false,
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Path,
            required: true,
        }
    }

    pub fn body(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Body,
            required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub status: u16,
    pub size: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub method: HttpMethod,
    pub url: String,
    pub parameters: Vec<Parameter>,
    pub headers: Vec<Header>,
    pub depth: usize,
    pub source: Source,
    pub response: Option<ResponseMeta>,
    pub security: SecurityAnalysis,
}

impl Endpoint {
    /// Registry identity: method and URL exactly as parsed.
    pub fn identity(method: HttpMethod, url: &str) -> String {
        format!("{}:{}", method, url)
    }

    /// Stable short id derived from the identity string.
    pub fn derive_id(method: HttpMethod, url: &str) -> String {
        let mut hasher = DefaultHasher::new();
        Self::identity(method, url).hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    pub fn key(&self) -> String {
        Self::identity(self.method, &self.url)
    }

    pub fn display_path(&self) -> String {
        format!("{:7} {}", self.method, self.url)
    }

    pub fn path_params(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.kind == ParamKind::Path)
    }
}
