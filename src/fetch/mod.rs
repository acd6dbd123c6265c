mod browser;

pub use browser::{Browser, ChromeBrowser, ObservedRequest, RenderedPage};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{Result, ScoutError};
use crate::http::{HttpClient, HttpResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Static,
    Rendered,
}

/// Content retrieved for one URL.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration_ms: u64,
    pub rendered: bool,
    pub observed: Vec<ObservedRequest>,
    /// Why a rendered fetch fell back to static, if it did.
    pub render_error: Option<ScoutError>,
}

impl Page {
    pub fn from_response(response: HttpResponse) -> Self {
        Self {
            url: response.url,
            status: response.status,
            headers: response.headers,
            body: response.body,
            duration_ms: response.duration_ms,
            rendered: false,
            observed: Vec::new(),
            render_error: None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }
}

/// Static or browser-rendered retrieval. Rendering always falls back to a
/// static fetch when the browser cannot be used.
pub struct Fetcher {
    http: Arc<HttpClient>,
    browser: Option<Arc<dyn Browser>>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(http: Arc<HttpClient>, browser: Option<Arc<dyn Browser>>, timeout: Duration) -> Self {
        Self {
            http,
            browser,
            timeout,
        }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn can_render(&self) -> bool {
        self.browser.is_some()
    }

    /// Rendered fetches report the document's own status and content type;
    /// non-HTML documents come back as their raw text.
    pub async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Page> {
        let browser = match (mode, &self.browser) {
            (FetchMode::Rendered, Some(browser)) => browser,
            _ => return self.fetch_static(url).await,
        };

        self.http.limiter().acquire().await;
        let start = Instant::now();

        match browser.render(url, self.timeout).await {
            Ok(rendered) => Ok(Page {
                url: rendered.url,
                status: rendered.status,
                headers: HashMap::from([("content-type".to_string(), rendered.content_type)]),
                body: rendered.body,
                duration_ms: start.elapsed().as_millis() as u64,
                rendered: true,
                observed: rendered.requests,
                render_error: None,
            }),
            Err(err) => {
                warn!("[Fetch] Rendering {} failed, falling back to static: {}", url, err);
                let mut page = self.fetch_static(url).await?;
                page.render_error = Some(err);
                Ok(page)
            }
        }
    }

    async fn fetch_static(&self, url: &str) -> Result<Page> {
        self.http.get(url).await.map(Page::from_response)
    }

    pub async fn probe_head(&self, url: &str) -> Result<HttpResponse> {
        self.http.head(url).await
    }

    pub async fn probe_get(&self, url: &str) -> Result<HttpResponse> {
        self.http.get(url).await
    }

    /// Releases the browser, if one was ever started.
    pub async fn shutdown(&self) {
        if let Some(browser) = &self.browser {
            browser.close().await;
        }
    }
}
