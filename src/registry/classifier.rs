use regex::Regex;
use url::Url;

use crate::extractor::mentions_auth;
use crate::models::{
    HttpMethod, ParamKind, Parameter, RiskLevel, SecurityAnalysis, Vulnerability, VulnType,
};

/// Small rule chain run on every recorded endpoint.
///
/// Rule order only decides the order findings are listed in; the risk level
/// is always the highest severity among them.
pub struct SecurityClassifier {
    credential_param: Regex,
    privileged_path: Regex,
}

impl SecurityClassifier {
    pub fn new() -> Self {
        Self {
            credential_param: Regex::new(
                r"(?i)^(password|passwd|pwd|token|access_token|refresh_token|api[_-]?key|apikey|secret|client_secret|session|sessionid|auth)$",
            )
            .unwrap(),
            privileged_path: Regex::new(r"(?i)/(admin|debug|internal|actuator|console|manage)(/|$)")
                .unwrap(),
        }
    }

    pub fn classify(&self, method: HttpMethod, url: &Url, params: &[Parameter]) -> SecurityAnalysis {
        let mut findings = Vec::new();
        let plaintext = matches!(url.scheme(), "http" | "ws");

        if plaintext {
            findings.push(Vulnerability::medium(
                VulnType::InsecureTransport,
                "Endpoint is served without TLS",
            ));
        }

        if method == HttpMethod::Delete {
            findings.push(Vulnerability::high(
                VulnType::DestructiveMethod,
                "Endpoint accepts DELETE requests",
            ));
        }

        let credentials: Vec<&str> = params
            .iter()
            .filter(|p| p.kind == ParamKind::Query && self.credential_param.is_match(&p.name))
            .map(|p| p.name.as_str())
            .collect();

        if !credentials.is_empty() {
            let names = credentials.join(", ");
            if plaintext {
                findings.push(Vulnerability::critical(
                    VulnType::CleartextCredentials,
                    format!("Credential parameters sent over plain HTTP: {}", names),
                ));
            } else {
                findings.push(Vulnerability::high(
                    VulnType::CredentialsInUrl,
                    format!("Credential parameters carried in the query string: {}", names),
                ));
            }
        }

        if self.privileged_path.is_match(url.path()) {
            findings.push(Vulnerability::low(
                VulnType::PrivilegedSurface,
                "Path suggests an administrative or debug surface",
            ));
        }

        let risk_level = findings
            .iter()
            .map(|v| RiskLevel::from(v.severity))
            .max()
            .unwrap_or(RiskLevel::Low);

        SecurityAnalysis {
            has_auth: mentions_auth(url.as_str()),
            vulnerabilities: findings,
            risk_level,
        }
    }
}

impl Default for SecurityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(method: HttpMethod, url: &str, params: &[Parameter]) -> SecurityAnalysis {
        SecurityClassifier::new().classify(method, &Url::parse(url).unwrap(), params)
    }

    #[test]
    fn test_https_get_is_low() {
        let analysis = classify(HttpMethod::Get, "https://example.com/api/users", &[]);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert!(analysis.vulnerabilities.is_empty());
        assert!(!analysis.has_auth);
    }

    #[test]
    fn test_http_get_is_at_least_medium() {
        let analysis = classify(HttpMethod::Get, "http://example.com/api/users", &[]);
        assert!(analysis.risk_level >= RiskLevel::Medium);
        assert_eq!(analysis.vulnerabilities[0].vuln_type, VulnType::InsecureTransport);
    }

    #[test]
    fn test_delete_is_high_regardless_of_scheme() {
        let secure = classify(HttpMethod::Delete, "https://example.com/api/users/1", &[]);
        let plain = classify(HttpMethod::Delete, "http://example.com/api/users/1", &[]);
        assert_eq!(secure.risk_level, RiskLevel::High);
        assert_eq!(plain.risk_level, RiskLevel::High);
        assert_eq!(plain.vulnerabilities.len(), 2);
    }

    #[test]
    fn test_credentials_in_query() {
        let params = [Parameter::query("api_key"), Parameter::query("page")];
        let secure = classify(HttpMethod::Get, "https://example.com/api/x?api_key=1&page=2", &params);
        let plain = classify(HttpMethod::Get, "http://example.com/api/x?api_key=1&page=2", &params);
        assert_eq!(secure.risk_level, RiskLevel::High);
        assert_eq!(plain.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_has_auth_is_independent_of_risk() {
        let analysis = classify(HttpMethod::Post, "https://example.com/api/login", &[]);
        assert!(analysis.has_auth);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_privileged_path_is_low() {
        let analysis = classify(HttpMethod::Get, "https://example.com/admin/users", &[]);
        assert_eq!(analysis.vulnerabilities.len(), 1);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
    }
}
