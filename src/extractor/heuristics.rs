//! URL classification shared by the frontier, the discovery strategies and
//! the endpoint registry.

use regex::Regex;
use std::sync::LazyLock;

/// Extensions that never carry API responses worth fetching.
pub const NON_CONTENT_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp", "tiff", "avif",
    // fonts
    "woff", "woff2", "ttf", "eot", "otf",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "rar", "7z", "xz",
    // executables and packages
    "exe", "dmg", "msi", "bin", "apk", "deb", "rpm", "iso",
    // media and documents
    "mp3", "mp4", "avi", "mov", "webm", "wav", "ogg", "pdf",
];

/// Script and style assets. These are analysed, never reported as endpoints.
const ASSET_EXTENSIONS: &[&str] = &["js", "mjs", "css", "map"];

/// Resource nouns that make an `/noun/<id>` path look like a REST call.
const RESOURCE_KEYWORDS: &[&str] = &[
    "api", "rest", "service", "services", "data", "user", "users", "account", "accounts",
    "order", "orders", "item", "items", "product", "products", "customer", "customers",
    "resource", "resources", "record", "records", "profile", "profiles", "session", "sessions",
    "admin", "auth", "token", "tokens", "v1", "v2", "v3",
];

static STRONG_INDICATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(/api(/|$|\?)|/rest(/|$|\?)|/graphql|/auth(/|$|\?)|/oauth|/wp-json|/v\d+(\.\d+)?(/|$|\?)|\.(json|xml|ya?ml)($|\?))",
    )
    .expect("strong indicator pattern")
});

static RESOURCE_WITH_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/([a-z][a-z0-9_-]*)/(\d+|[0-9a-f]{8}-[0-9a-f-]{27}|\{[^}/]+\}|:[a-z_][a-z0-9_]*)(/|$|\?)")
        .expect("resource id pattern")
});

static AUTH_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(auth|login|signin|sign-in|logon)").expect("auth pattern")
});

fn path_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn decoded(url: &str) -> String {
    urlencoding::decode(url)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| url.to_string())
}

/// True when the URL points at an image, font, archive or other binary.
pub fn is_non_content(url: &str) -> bool {
    path_extension(url)
        .map(|ext| NON_CONTENT_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn is_script_asset(url: &str) -> bool {
    matches!(path_extension(url).as_deref(), Some("js") | Some("mjs"))
}

/// Heuristic API classifier.
///
/// Combines strong path/content indicators, `/resource/<id>` shapes backed by
/// a resource keyword, and query-string presence.
pub fn looks_like_api(url: &str) -> bool {
    if let Some(ext) = path_extension(url) {
        if ASSET_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }
    }

    let url = decoded(url);
    let path_and_query = strip_origin(&url);

    if STRONG_INDICATOR.is_match(path_and_query) {
        return true;
    }

    for caps in RESOURCE_WITH_ID.captures_iter(path_and_query) {
        let noun = caps[1].to_ascii_lowercase();
        if RESOURCE_KEYWORDS.contains(&noun.as_str()) {
            return true;
        }
    }

    has_meaningful_query(path_and_query)
}

/// True when the URL text mentions authentication.
pub fn mentions_auth(url: &str) -> bool {
    AUTH_TOKEN.is_match(url)
}

/// True when a host name itself suggests an API origin.
pub fn host_suggests_api(host: &str) -> bool {
    let lower = host.to_ascii_lowercase();
    ["api", "rest", "service"].iter().any(|t| lower.contains(t))
}

fn strip_origin(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => &rest[path_start..],
                None => match rest.find('?') {
                    Some(q) => &rest[q..],
                    None => "",
                },
            }
        }
        None => url,
    }
}

fn has_meaningful_query(path_and_query: &str) -> bool {
    let Some((path, query)) = path_and_query.split_once('?') else {
        return false;
    };
    let query = query.split('#').next().unwrap_or("");
    if query.is_empty() {
        return false;
    }
    !matches!(
        path_extension(path).as_deref(),
        Some("html") | Some("htm")
    )
}

/// Advisory confidence for a candidate that `pattern_count` distinct patterns
/// matched `match_count` times in total.
pub fn confidence(pattern_count: usize, match_count: usize) -> f64 {
    if match_count == 0 {
        return 0.0;
    }

    let mut score: f64 = 0.3;
    if match_count > 1 {
        score += 0.2;
    }
    if match_count > 5 {
        score += 0.2;
    }
    if match_count > 10 {
        score += 0.1;
    }
    if pattern_count > 2 {
        score += 0.2;
    }

    score.clamp(0.0, 1.0)
}
