use url::Url;

use crate::extractor::{host_suggests_api, is_non_content, is_script_asset, looks_like_api};

/// Decides which outbound links the crawl follows.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    include_external: bool,
}

impl LinkPolicy {
    pub fn new(include_external: bool) -> Self {
        Self { include_external }
    }

    pub fn should_follow(&self, url: &str, from: &Url) -> bool {
        let Ok(target) = Url::parse(url) else {
            return false;
        };
        self.should_follow_url(&target, from)
    }

    pub fn should_follow_url(&self, url: &Url, from: &Url) -> bool {
        if !self.scheme_allowed(url) {
            return false;
        }

        let api_like = looks_like_api(url.as_str());
        if is_non_content(url.as_str()) && !api_like {
            return false;
        }
        // scripts are analysed after the crawl, not crawled
        if is_script_asset(url.as_str()) {
            return false;
        }

        if url.origin() == from.origin() || self.include_external {
            return true;
        }
        api_like && url.host_str().map(host_suggests_api).unwrap_or(false)
    }

    /// Seeds skip the origin check but not the scheme and extension filters.
    pub fn admits_seed(&self, url: &Url) -> bool {
        self.scheme_allowed(url)
            && (!is_non_content(url.as_str()) || looks_like_api(url.as_str()))
            && !is_script_asset(url.as_str())
    }

    /// Only web schemes; mailto, tel, javascript, ftp and the rest are refused.
    fn scheme_allowed(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from() -> Url {
        Url::parse("https://example.com/index.html").unwrap()
    }

    #[test]
    fn test_same_origin_page_is_followed() {
        let policy = LinkPolicy::new(false);
        assert!(policy.should_follow("https://example.com/about", &from()));
    }

    #[test]
    fn test_refused_schemes() {
        let policy = LinkPolicy::new(true);
        for link in ["mailto:a@example.com", "tel:+123", "javascript:void(0)", "ftp://example.com/x"] {
            assert!(!policy.should_follow(link, &from()), "{}", link);
        }
    }

    #[test]
    fn test_binary_extensions_unless_api() {
        let policy = LinkPolicy::new(false);
        assert!(!policy.should_follow("https://example.com/logo.png", &from()));
        assert!(!policy.should_follow("https://example.com/font.woff2", &from()));
        assert!(policy.should_follow("https://example.com/api/export.zip", &from()));
    }

    #[test]
    fn test_cross_origin_rules() {
        let strict = LinkPolicy::new(false);
        assert!(!strict.should_follow("https://other.com/about", &from()));
        assert!(!strict.should_follow("https://other.com/api/users", &from()));
        assert!(strict.should_follow("https://api.other.com/api/users", &from()));
        assert!(!strict.should_follow("https://api.other.com/about", &from()));

        let open = LinkPolicy::new(true);
        assert!(open.should_follow("https://other.com/about", &from()));
    }

    #[test]
    fn test_seeds_skip_origin_check() {
        let policy = LinkPolicy::new(false);
        assert!(policy.admits_seed(&Url::parse("https://api.example.com/").unwrap()));
        assert!(!policy.admits_seed(&Url::parse("https://example.com/a.png").unwrap()));
    }
}
