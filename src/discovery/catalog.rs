use serde::Serialize;
use std::fmt;

/// Web frameworks the fingerprint strategy can recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Framework {
    Express,
    NextJs,
    Django,
    Rails,
    Laravel,
    Spring,
    AspNet,
    WordPress,
    Drupal,
    Strapi,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Framework::Express => "Express",
            Framework::NextJs => "Next.js",
            Framework::Django => "Django",
            Framework::Rails => "Rails",
            Framework::Laravel => "Laravel",
            Framework::Spring => "Spring",
            Framework::AspNet => "ASP.NET",
            Framework::WordPress => "WordPress",
            Framework::Drupal => "Drupal",
            Framework::Strapi => "Strapi",
        };
        write!(f, "{}", name)
    }
}

/// Where a fingerprint marker is looked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerLocation {
    /// `(header name, substring of its value)`; empty substring matches presence.
    Header(&'static str, &'static str),
    Cookie(&'static str),
    Body(&'static str),
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameworkProfile {
    pub framework: Framework,
    pub markers: &'static [MarkerLocation],
    pub api_paths: &'static [&'static str],
}

/// Headers whose presence marks a response as coming from an API.
pub const API_SIGNAL_HEADERS: &[&str] = &[
    "access-control-allow-origin",
    "access-control-allow-methods",
    "access-control-allow-headers",
    "api-version",
    "x-api-version",
    "api-supported-versions",
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "x-rate-limit-limit",
    "ratelimit-limit",
    "x-request-id",
];

/// Probe catalogs used by the discovery strategies.
pub struct ProbeCatalog;

impl ProbeCatalog {
    const WELL_KNOWN: &'static [&'static str] = &[
        "/.well-known/openid-configuration",
        "/.well-known/oauth-authorization-server",
        "/.well-known/security.txt",
        "/.well-known/jwks.json",
        "/.well-known/apple-app-site-association",
        "/.well-known/assetlinks.json",
        "/openapi.json",
        "/openapi.yaml",
        "/swagger.json",
        "/swagger/v1/swagger.json",
        "/swagger-ui.html",
        "/api-docs",
        "/v2/api-docs",
        "/v3/api-docs",
        "/api/swagger.json",
        "/api/openapi.json",
        "/graphql",
        "/graphiql",
        "/api/graphql",
        "/health",
        "/healthz",
        "/status",
        "/version",
        "/metrics",
        "/actuator",
        "/actuator/health",
    ];

    const BRUTE_FORCE: &'static [&'static str] = &[
        "/api",
        "/api/v1",
        "/api/v2",
        "/api/v3",
        "/rest",
        "/rest/v1",
        "/api/users",
        "/api/user",
        "/api/me",
        "/api/account",
        "/api/accounts",
        "/api/auth",
        "/api/auth/login",
        "/api/login",
        "/api/logout",
        "/api/register",
        "/api/token",
        "/api/session",
        "/api/config",
        "/api/settings",
        "/api/search",
        "/api/products",
        "/api/orders",
        "/api/items",
        "/api/customers",
        "/api/admin",
        "/api/status",
        "/api/health",
        "/api/v1/users",
        "/api/v1/auth",
        "/api/v1/status",
        "/api/v2/users",
        "/auth/login",
        "/oauth/token",
        "/wp-json/wp/v2/users",
    ];

    const API_ROOTS: &'static [&'static str] = &["/api", "/api/v1", "/rest", "/graphql"];

    const SUBDOMAIN_LABELS: &'static [&'static str] = &[
        "api", "api-v1", "api-v2", "rest", "graphql", "gateway", "services", "service", "backend",
        "internal-api", "dev-api", "api-dev", "staging-api", "api-staging", "sandbox", "developer",
        "developers", "mobile-api", "m-api", "partner-api",
    ];

    const CRUD_SUFFIXES: &'static [&'static str] = &["", "/{id}", "/search", "/count", "/bulk"];

    const VERSION_TOKENS: &'static [&'static str] = &["v1", "v2", "v3"];

    const FRAMEWORKS: &'static [FrameworkProfile] = &[
        FrameworkProfile {
            framework: Framework::Express,
            markers: &[MarkerLocation::Header("x-powered-by", "express")],
            api_paths: &["/api", "/api/v1", "/api/health", "/api/status"],
        },
        FrameworkProfile {
            framework: Framework::NextJs,
            markers: &[
                MarkerLocation::Header("x-powered-by", "next.js"),
                MarkerLocation::Body("__NEXT_DATA__"),
                MarkerLocation::Body("/_next/static/"),
            ],
            api_paths: &["/api", "/api/auth/session", "/api/auth/providers", "/api/auth/csrf"],
        },
        FrameworkProfile {
            framework: Framework::Django,
            markers: &[
                MarkerLocation::Cookie("csrftoken"),
                MarkerLocation::Body("csrfmiddlewaretoken"),
            ],
            api_paths: &["/api/", "/api/schema/", "/api/docs/", "/admin/login/"],
        },
        FrameworkProfile {
            framework: Framework::Rails,
            markers: &[
                MarkerLocation::Header("x-runtime", ""),
                MarkerLocation::Cookie("_session_id"),
                MarkerLocation::Body("csrf-param"),
            ],
            api_paths: &["/api/v1", "/rails/info/routes", "/users/sign_in.json"],
        },
        FrameworkProfile {
            framework: Framework::Laravel,
            markers: &[
                MarkerLocation::Cookie("laravel_session"),
                MarkerLocation::Cookie("XSRF-TOKEN"),
            ],
            api_paths: &["/api/user", "/sanctum/csrf-cookie", "/api/v1"],
        },
        FrameworkProfile {
            framework: Framework::Spring,
            markers: &[
                MarkerLocation::Cookie("JSESSIONID"),
                MarkerLocation::Body("Whitelabel Error Page"),
            ],
            api_paths: &["/actuator", "/actuator/mappings", "/v3/api-docs", "/api/v1"],
        },
        FrameworkProfile {
            framework: Framework::AspNet,
            markers: &[
                MarkerLocation::Header("x-aspnet-version", ""),
                MarkerLocation::Header("x-powered-by", "asp.net"),
                MarkerLocation::Cookie("ASP.NET_SessionId"),
            ],
            api_paths: &["/api/values", "/swagger/v1/swagger.json", "/odata"],
        },
        FrameworkProfile {
            framework: Framework::WordPress,
            markers: &[
                MarkerLocation::Header("link", "api.w.org"),
                MarkerLocation::Body("wp-content/"),
            ],
            api_paths: &["/wp-json/", "/wp-json/wp/v2/posts", "/wp-json/wp/v2/users", "/xmlrpc.php"],
        },
        FrameworkProfile {
            framework: Framework::Drupal,
            markers: &[
                MarkerLocation::Header("x-generator", "drupal"),
                MarkerLocation::Header("x-drupal-cache", ""),
            ],
            api_paths: &["/jsonapi", "/rest/session/token", "/user/login?_format=json"],
        },
        FrameworkProfile {
            framework: Framework::Strapi,
            markers: &[MarkerLocation::Header("x-powered-by", "strapi")],
            api_paths: &["/api/users/me", "/api/auth/local", "/_health"],
        },
    ];

    pub fn well_known_paths() -> &'static [&'static str] {
        Self::WELL_KNOWN
    }

    pub fn brute_force_paths() -> &'static [&'static str] {
        Self::BRUTE_FORCE
    }

    pub fn api_roots() -> &'static [&'static str] {
        Self::API_ROOTS
    }

    pub fn subdomain_labels() -> &'static [&'static str] {
        Self::SUBDOMAIN_LABELS
    }

    pub fn crud_suffixes() -> &'static [&'static str] {
        Self::CRUD_SUFFIXES
    }

    pub fn version_tokens() -> &'static [&'static str] {
        Self::VERSION_TOKENS
    }

    pub fn frameworks() -> &'static [FrameworkProfile] {
        Self::FRAMEWORKS
    }

    pub fn framework(framework: Framework) -> Option<&'static FrameworkProfile> {
        Self::FRAMEWORKS.iter().find(|p| p.framework == framework)
    }
}
