pub mod cli;
pub mod config;
pub mod crawler;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod http;
pub mod models;
pub mod registry;
pub mod reporter;

pub use config::{CrawlMode, ScannerConfig};
pub use crawler::{Orchestrator, ProgressSink, StopHandle, is_valid_domain};
pub use discovery::StrategyKind;
pub use error::{Result, ScoutError};
pub use extractor::{ContentExtractor, PatternMatcher, RegexPatternMatcher, confidence, looks_like_api};
pub use fetch::{Browser, FetchMode, Fetcher};
pub use models::{
    CrawlResult, Endpoint, HttpMethod, RiskLevel, ScanProgress, ScanStage, Severity, Source,
    VulnType, Vulnerability,
};
pub use registry::{EndpointRegistry, SecurityClassifier};
pub use reporter::{ConsoleReporter, HtmlExporter, JsonExporter};
