use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, redirect::Policy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::RateLimiter;
use crate::error::{Result, ScoutError};

const MAX_REDIRECTS: usize = 10;

/// A retrieved response. Anything below 500 counts as content.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Static-mode HTTP access. Every request waits on the shared rate limiter.
pub struct HttpClient {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration, limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| ScoutError::Session(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, limiter })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let request = self
            .client
            .request(Method::GET, url)
            .header("Accept", "text/html,application/json,application/xml,*/*;q=0.8");
        self.execute_request(url, request, true).await
    }

    /// Lightweight existence check; the body is never read.
    pub async fn head(&self, url: &str) -> Result<HttpResponse> {
        let request = self.client.request(Method::HEAD, url);
        self.execute_request(url, request, false).await
    }

    async fn execute_request(
        &self,
        url: &str,
        request: RequestBuilder,
        read_body: bool,
    ) -> Result<HttpResponse> {
        self.limiter.acquire().await;
        let start = Instant::now();

        let response = request
            .send()
            .await
            .map_err(|e| ScoutError::network(url, e))?;

        let status = response.status().as_u16();
        if status >= 500 {
            return Err(ScoutError::network(url, format!("server error {}", status)));
        }

        let final_url = response.url().to_string();
        let headers = Self::collect_headers(response.headers());

        let body = if read_body {
            response
                .text()
                .await
                .map_err(|e| ScoutError::network(url, e))?
        } else {
            String::new()
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!("[Http] {} {} ({}ms)", status, url, duration_ms);

        Ok(HttpResponse {
            url: final_url,
            status,
            headers,
            body,
            duration_ms,
        })
    }

    fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    v.to_str().unwrap_or("").to_string(),
                )
            })
            .collect()
    }
}
