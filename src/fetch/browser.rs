use async_trait::async_trait;
use headless_chrome::{Browser as ChromeHandle, LaunchOptions, Tab};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, ScoutError};
use crate::models::HttpMethod;

/// A network call the page made while it was being rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedRequest {
    pub url: String,
    pub method: HttpMethod,
}

/// The main document after scripts ran. `body` is the serialised DOM for
/// HTML documents and the raw text for anything else (JSON, XML, plain text).
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
    pub requests: Vec<ObservedRequest>,
}


/// Headless-browser capability. One instance per session.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn render(&self, url: &str, timeout: Duration) -> Result<RenderedPage>;

    /// Releases the browser process. Safe to call more than once.
    async fn close(&self);
}

/// Installs fetch/XHR recorders, then scrolls to trigger lazy loaders.
const TRIGGER_SCRIPT: &str = r#"
(function() {
    window.__apiscout = window.__apiscout || [];
    const log = window.__apiscout;
    const originalFetch = window.fetch;
    if (originalFetch && !originalFetch.__apiscout) {
        const wrapped = function(input, init) {
            try {
                const url = (input && input.url) ? input.url : String(input);
                const method = (init && init.method) || (input && input.method) || 'GET';
                log.push({ url: url, method: String(method) });
            } catch (e) {}
            return originalFetch.apply(this, arguments);
        };
        wrapped.__apiscout = true;
        window.fetch = wrapped;
    }
    const originalOpen = XMLHttpRequest.prototype.open;
    if (!originalOpen.__apiscout) {
        const wrapped = function(method, url) {
            try { log.push({ url: String(url), method: String(method) }); } catch (e) {}
            return originalOpen.apply(this, arguments);
        };
        wrapped.__apiscout = true;
        XMLHttpRequest.prototype.open = wrapped;
    }
    window.scrollTo(0, document.body ? document.body.scrollHeight : 0);
    window.dispatchEvent(new Event('scroll'));
    return true;
})()
"#;

const COLLECT_SCRIPT: &str = r#"
JSON.stringify((function() {
    const seen = [];
    performance.getEntriesByType('resource').forEach(function(entry) {
        if (['fetch', 'xmlhttprequest', 'beacon'].indexOf(entry.initiatorType) !== -1) {
            seen.push({ url: entry.name, method: 'GET' });
        }
    });
    (window.__apiscout || []).forEach(function(r) { seen.push(r); });
    const nav = performance.getEntriesByType('navigation')[0];
    const contentType = document.contentType || 'text/html';
    return {
        requests: seen,
        status: nav && nav.responseStatus ? nav.responseStatus : null,
        contentType: contentType,
        text: contentType.indexOf('html') === -1 && document.body ? document.body.innerText : null
    };
})())
"#;

const SETTLE_TIME: Duration = Duration::from_millis(1500);

#[derive(Deserialize)]
struct ObservedEntry {
    url: String,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DocumentReport {
    #[serde(default)]
    requests: Vec<ObservedEntry>,
    status: Option<u16>,
    content_type: Option<String>,
    text: Option<String>,
}

/// Chrome/Chromium driver. The process is launched on first use and torn
/// down by [`Browser::close`].
pub struct ChromeBrowser {
    handle: Arc<Mutex<Option<ChromeHandle>>>,
    idle_timeout: Duration,
}

impl ChromeBrowser {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
            idle_timeout,
        }
    }

    fn launch_or_reuse(
        slot: &Mutex<Option<ChromeHandle>>,
        idle_timeout: Duration,
    ) -> anyhow::Result<ChromeHandle> {
        let mut guard = slot
            .lock()
            .map_err(|_| anyhow::anyhow!("browser slot poisoned"))?;

        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }

        info!("[Browser] Launching headless Chrome");
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .idle_browser_timeout(idle_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Browser launch options error: {}", e))?;

        let browser = ChromeHandle::new(options)?;
        *guard = Some(browser.clone());
        Ok(browser)
    }

    fn render_sync(browser: &ChromeHandle, url: &str, timeout: Duration) -> anyhow::Result<RenderedPage> {
        let tab = browser.new_tab()?;
        tab.set_default_timeout(timeout);

        let result = Self::render_in_tab(&tab, url);
        let _ = tab.close(true);
        result
    }

    fn render_in_tab(tab: &Arc<Tab>, url: &str) -> anyhow::Result<RenderedPage> {
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;

        tab.evaluate(TRIGGER_SCRIPT, false)?;
        std::thread::sleep(SETTLE_TIME);

        let report = tab
            .evaluate(COLLECT_SCRIPT, false)
            .ok()
            .and_then(|obj| obj.value)
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|s| serde_json::from_str::<DocumentReport>(&s).ok())
            .unwrap_or_default();

        let requests = report
            .requests
            .into_iter()
            .map(|entry| ObservedRequest {
                method: entry
                    .method
                    .as_deref()
                    .and_then(HttpMethod::parse)
                    .unwrap_or(HttpMethod::Get),
                url: entry.url,
            })
            .collect::<Vec<_>>();

        let content_type = report.content_type.unwrap_or_else(|| "text/html".to_string());
        let body = match report.text {
            Some(text) if !content_type.contains("html") => text,
            _ => tab.get_content()?,
        };
        let status = report.status.unwrap_or(200);
        let final_url = tab.get_url();

        debug!(
            "[Browser] {} rendered ({}, {}), {} network calls observed",
            url,
            status,
            content_type,
            requests.len()
        );

        Ok(RenderedPage {
            url: final_url,
            status,
            content_type,
            body,
            requests,
        })
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn render(&self, url: &str, timeout: Duration) -> Result<RenderedPage> {
        let slot = Arc::clone(&self.handle);
        let idle_timeout = self.idle_timeout;
        let url_owned = url.to_string();

        tokio::task::spawn_blocking(move || {
            let browser = Self::launch_or_reuse(&slot, idle_timeout)?;
            Self::render_sync(&browser, &url_owned, timeout)
        })
        .await
        .map_err(|e| ScoutError::render(url, format!("browser task panicked: {}", e)))?
        .map_err(|e| ScoutError::render(url, e))
    }

    async fn close(&self) {
        let taken = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if taken.is_some() {
            info!("[Browser] Closing headless Chrome");
            // dropping the last handle kills the process
            let _ = tokio::task::spawn_blocking(move || drop(taken)).await;
        }
    }
}
