use std::net::IpAddr;
use url::{Host, Url};

use crate::error::{Result, ScoutError};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Accepts DNS names with at least two labels, `localhost`, and IP literals.
pub fn is_valid_domain(input: &str) -> bool {
    let domain = input.trim().trim_end_matches('.');
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
        return false;
    }
    if domain.parse::<IpAddr>().is_ok() || domain.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });

    let tld = labels[labels.len() - 1];
    labels_ok && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// A validated crawl target.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Host as the caller named it.
    pub domain: String,
    /// Origin the crawl starts from.
    pub base: Url,
}

impl Target {
    /// A bare domain is crawled over HTTPS; an `http(s)://` URL keeps its
    /// scheme and port but loses its path.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.contains("://") {
            let url = Url::parse(input)
                .map_err(|e| ScoutError::Validation(format!("{}: {}", input, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ScoutError::Validation(format!(
                    "unsupported scheme '{}'",
                    url.scheme()
                )));
            }
            let host = match url.host() {
                Some(Host::Domain(d)) if is_valid_domain(d) => d.to_string(),
                Some(Host::Ipv4(ip)) => ip.to_string(),
                Some(Host::Ipv6(ip)) => format!("[{}]", ip),
                _ => return Err(ScoutError::Validation(format!("invalid host in '{}'", input))),
            };

            let mut base = url;
            base.set_path("/");
            base.set_query(None);
            base.set_fragment(None);
            return Ok(Self { domain: host, base });
        }

        if !is_valid_domain(input) {
            return Err(ScoutError::Validation(format!("'{}' is not a valid domain", input)));
        }

        let domain = input.trim_end_matches('.').to_ascii_lowercase();
        let base = Url::parse(&format!("https://{}/", domain))
            .map_err(|e| ScoutError::Validation(format!("{}: {}", input, e)))?;
        Ok(Self { domain, base })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_domains() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("api.example.co.uk"));
        assert!(is_valid_domain("localhost"));
        assert!(is_valid_domain("192.168.1.1"));
        assert!(is_valid_domain("my-site.io"));
    }

    #[test]
    fn test_invalid_domains() {
        assert!(!is_valid_domain("not a domain!!"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("example"));
        assert!(!is_valid_domain("-bad.com"));
        assert!(!is_valid_domain("example.c0m"));
        assert!(!is_valid_domain("a..b.com"));
    }

    #[test]
    fn test_target_from_bare_domain() {
        let target = Target::parse("Example.com").unwrap();
        assert_eq!(target.domain, "example.com");
        assert_eq!(target.base.as_str(), "https://example.com/");
    }

    #[test]
    fn test_target_from_url_keeps_scheme_and_port() {
        let target = Target::parse("http://127.0.0.1:8080/some/path?x=1").unwrap();
        assert_eq!(target.domain, "127.0.0.1");
        assert_eq!(target.base.as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_target_rejects_garbage() {
        assert!(matches!(Target::parse("not a domain!!"), Err(ScoutError::Validation(_))));
        assert!(matches!(Target::parse("ftp://example.com"), Err(ScoutError::Validation(_))));
    }
}
