mod endpoint;
mod progress;
mod result;
mod vulnerability;

pub use endpoint::{Endpoint, Header, HttpMethod, ParamKind, Parameter, ResponseMeta, Source};
pub use progress::{ScanProgress, ScanStage};
pub use result::{CrawlError, CrawlResult, CrawlStats, ErrorKind};
pub use vulnerability::{RiskLevel, SecurityAnalysis, Severity, VulnType, Vulnerability};
