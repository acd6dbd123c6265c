use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::{Endpoint, RiskLevel, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Network,
    Render,
    Strategy,
    Session,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Render => "render",
            ErrorKind::Strategy => "strategy",
            ErrorKind::Session => "session",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the session error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlError {
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CrawlError {
    pub fn new(url: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub by_source: BTreeMap<Source, usize>,
    pub by_risk: BTreeMap<RiskLevel, usize>,
    pub unique_domains: usize,
    pub average_response_ms: f64,
    pub total_requests: u64,
    pub scripts_analyzed: usize,
}

impl CrawlStats {
    pub fn from_session(
        endpoints: &[Endpoint],
        domains: &HashSet<String>,
        response_times_ms: &[u64],
        total_requests: u64,
        scripts_analyzed: usize,
    ) -> Self {
        let mut stats = Self {
            unique_domains: domains.len(),
            total_requests,
            scripts_analyzed,
            ..Self::default()
        };

        for endpoint in endpoints {
            *stats.by_source.entry(endpoint.source).or_insert(0) += 1;
            *stats.by_risk.entry(endpoint.security.risk_level).or_insert(0) += 1;
        }

        if !response_times_ms.is_empty() {
            let total: u64 = response_times_ms.iter().sum();
            stats.average_response_ms = total as f64 / response_times_ms.len() as f64;
        }

        stats
    }
}

/// Terminal snapshot of a session, emitted exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub domain: String,
    pub endpoints: Vec<Endpoint>,
    pub total_pages: usize,
    pub elapsed_ms: u64,
    pub errors: Vec<CrawlError>,
    pub stats: CrawlStats,
}

impl CrawlResult {
    pub fn endpoints_at_least(&self, level: RiskLevel) -> impl Iterator<Item = &Endpoint> {
        self.endpoints
            .iter()
            .filter(move |e| e.security.risk_level >= level)
    }
}
