use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn numeric_value(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// Aggregate endpoint risk. Always the maximum severity among findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info | Severity::Low => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::High => RiskLevel::High,
            Severity::Critical => RiskLevel::Critical,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VulnType {
    InsecureTransport,
    DestructiveMethod,
    CredentialsInUrl,
    CleartextCredentials,
    PrivilegedSurface,
}

impl fmt::Display for VulnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VulnType::InsecureTransport => "Insecure Transport",
            VulnType::DestructiveMethod => "Destructive Method",
            VulnType::CredentialsInUrl => "Credentials In URL",
            VulnType::CleartextCredentials => "Cleartext Credentials",
            VulnType::PrivilegedSurface => "Privileged Surface",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub vuln_type: VulnType,
    pub severity: Severity,
    pub description: String,
}

impl Vulnerability {
    pub fn new(vuln_type: VulnType, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            vuln_type,
            severity,
            description: description.into(),
        }
    }

    pub fn critical(vuln_type: VulnType, description: impl Into<String>) -> Self {
        Self::new(vuln_type, Severity::Critical, description)
    }

    pub fn high(vuln_type: VulnType, description: impl Into<String>) -> Self {
        Self::new(vuln_type, Severity::High, description)
    }

    pub fn medium(vuln_type: VulnType, description: impl Into<String>) -> Self {
        Self::new(vuln_type, Severity::Medium, description)
    }

    pub fn low(vuln_type: VulnType, description: impl Into<String>) -> Self {
        Self::new(vuln_type, Severity::Low, description)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityAnalysis {
    pub has_auth: bool,
    pub vulnerabilities: Vec<Vulnerability>,
    pub risk_level: RiskLevel,
}

impl SecurityAnalysis {
    pub fn max_severity(&self) -> Option<Severity> {
        self.vulnerabilities
            .iter()
            .map(|v| v.severity)
            .max_by_key(|s| s.numeric_value())
    }
}
