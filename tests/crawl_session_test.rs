use apiscout::crawler::{CallbackSink, NullSink, Orchestrator, ProgressSink, StopHandle};
use apiscout::discovery::StrategyKind;
use apiscout::error::{Result as ScoutResult, ScoutError};
use apiscout::extractor::{PatternMatch, PatternMatcher};
use apiscout::fetch::{Browser, RenderedPage};
use apiscout::models::{CrawlResult, ErrorKind, HttpMethod, Parameter, ScanProgress, ScanStage, Source};
use apiscout::{CrawlMode, ScannerConfig};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use url::Url;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn config(strategies: &[StrategyKind]) -> ScannerConfig {
    ScannerConfig {
        max_depth: 1,
        max_pages: 5,
        enable_javascript: false,
        crawl_delay: 0,
        timeout: 5_000,
        requests_per_second: 1_000,
        strategies: strategies.iter().copied().collect::<BTreeSet<_>>(),
        ..ScannerConfig::default()
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

const FIXTURE: &str = r#"
<!DOCTYPE html>
<html>
<body>
    <a href="/api/users">Users</a>
    <form action="/api/login" method="POST">
        <input type="text" name="username" />
        <input type="password" name="password" />
    </form>
    <script>
        fetch('/api/v1/orders').then(r => r.json());
    </script>
</body>
</html>
"#;

#[tokio::test]
async fn test_fixture_page_yields_exactly_three_endpoints() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(FIXTURE))
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(config(&StrategyKind::all()), Arc::new(NullSink));
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    let base = mock_server.uri();
    let mut found: Vec<(HttpMethod, String, Source)> = result
        .endpoints
        .iter()
        .map(|e| (e.method, e.url.clone(), e.source))
        .collect();
    found.sort_by(|a, b| a.1.cmp(&b.1));

    assert_eq!(
        found,
        vec![
            (HttpMethod::Post, format!("{}/api/login", base), Source::HtmlFormOrLink),
            (HttpMethod::Get, format!("{}/api/users", base), Source::HtmlFormOrLink),
            (HttpMethod::Get, format!("{}/api/v1/orders", base), Source::ScriptAnalysis),
        ]
    );

    let ids: HashSet<_> = result.endpoints.iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids.len(), 3);
    assert!(result.total_pages <= 5);

    let login = result
        .endpoints
        .iter()
        .find(|e| e.method == HttpMethod::Post)
        .unwrap();
    assert!(login.security.has_auth);
    assert!(login.parameters.iter().any(|p| p.name == "password"));
}

#[tokio::test]
async fn test_invalid_domain_goes_straight_to_error() {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&stages);
    let sink = CallbackSink(move |p: &apiscout::ScanProgress| recorder.lock().unwrap().push(p.stage));

    let orchestrator = Orchestrator::new(config(&[]), Arc::new(sink));
    let err = orchestrator.run("not a domain!!").await.unwrap_err();

    assert!(matches!(err, ScoutError::Validation(_)));
    assert_eq!(*stages.lock().unwrap(), vec![ScanStage::Error]);
}

#[tokio::test]
async fn test_page_budget_bounds_visited_urls() {
    let mock_server = MockServer::start().await;

    let links: String = (0..20)
        .map(|i| format!(r#"<a href="/page{}">Page {}</a>"#, i, i))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!("<html><body>{}</body></html>", links)))
        .mount(&mock_server)
        .await;
    for i in 0..20 {
        Mock::given(method("GET"))
            .and(path(format!("/page{}", i)))
            .respond_with(html("<html><body>leaf</body></html>"))
            .mount(&mock_server)
            .await;
    }

    let orchestrator = Orchestrator::new(config(&[]), Arc::new(NullSink));
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    assert_eq!(result.total_pages, 5);
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.len() <= 5, "{} requests sent", requests.len());
}

#[tokio::test]
async fn test_duplicate_discovery_keeps_latest_source() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
    <url><loc>{}/api/items</loc></url>
</urlset>"#,
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(sitemap),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/api/items">Items</a></body></html>"#))
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(config(&[StrategyKind::Sitemap]), Arc::new(NullSink));
    let result = orchestrator.run(&base).await.unwrap();

    let items: Vec<_> = result
        .endpoints
        .iter()
        .filter(|e| e.url == format!("{}/api/items", base))
        .collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source, Source::HtmlFormOrLink);
}

struct FailingBrowser {
    renders: AtomicUsize,
    closed: AtomicBool,
}

#[async_trait]
impl Browser for FailingBrowser {
    async fn render(&self, url: &str, _timeout: Duration) -> ScoutResult<RenderedPage> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Err(ScoutError::render(url, "no browser available"))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_render_failure_falls_back_to_static() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(FIXTURE))
        .mount(&mock_server)
        .await;

    let browser = Arc::new(FailingBrowser {
        renders: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
    });
    let config = ScannerConfig {
        enable_javascript: true,
        ..config(&[])
    };

    let orchestrator = Orchestrator::new(config, Arc::new(NullSink)).with_browser(browser.clone());
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    assert_eq!(result.endpoints.len(), 3);
    assert!(browser.renders.load(Ordering::SeqCst) >= 1);
    assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Render));
    assert!(browser.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failing_strategy_does_not_abort_session() {
    let mock_server = MockServer::start().await;

    // the landing page is down, so fingerprinting fails
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"[{"id": 1, "self": "/api/users/1"}]"#),
        )
        .mount(&mock_server)
        .await;

    let config = config(&[StrategyKind::Fingerprint, StrategyKind::BruteForce]);
    let orchestrator = Orchestrator::new(config, Arc::new(NullSink));
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Strategy));
    assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Network));

    let users = result
        .endpoints
        .iter()
        .find(|e| e.url == format!("{}/api/users", mock_server.uri()))
        .expect("brute force result recorded");
    assert_eq!(users.source, Source::Probe);
    assert_eq!(users.response.as_ref().map(|r| r.status), Some(200));

    assert!(result
        .endpoints
        .iter()
        .any(|e| e.url == format!("{}/api/users/1", mock_server.uri())));
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_completed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(FIXTURE))
        .mount(&mock_server)
        .await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&events);
    let sink = CallbackSink(move |p: &apiscout::ScanProgress| {
        recorder.lock().unwrap().push((p.stage, p.progress, p.pages_scanned, p.endpoints_found))
    });

    let orchestrator = Orchestrator::new(config(&[]), Arc::new(sink));
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    let events = events.lock().unwrap();
    assert!(events.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(events.windows(2).all(|w| w[0].2 <= w[1].2));
    assert!(events.windows(2).all(|w| w[0].0 == w[1].0 || w[0].0.can_transition_to(w[1].0)));

    let last = events.last().unwrap();
    assert_eq!(last.0, ScanStage::Completed);
    assert_eq!(last.1, 100);
    assert_eq!(last.3, result.endpoints.len());
}

fn request_count(requests: &[wiremock::Request], verb: &str, route: &str) -> usize {
    requests
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == route)
        .count()
}

fn json(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("content-type", "application/json")
        .set_body_string(body)
}

#[tokio::test]
async fn test_brute_force_registers_only_confirmed_paths() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(json(200, "[]"))
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(config(&[StrategyKind::BruteForce]), Arc::new(NullSink));
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    let base = mock_server.uri();
    let mut urls: Vec<_> = result.endpoints.iter().map(|e| e.url.clone()).collect();
    urls.sort();
    assert_eq!(urls, vec![format!("{}/api/me", base), format!("{}/api/users", base)]);

    let me = result.endpoints.iter().find(|e| e.url.ends_with("/api/me")).unwrap();
    assert_eq!(me.source, Source::Probe);
    assert_eq!(me.response.as_ref().map(|r| r.status), Some(401));
}

#[tokio::test]
async fn test_discovered_urls_are_not_fetched_again_by_the_crawl() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/api/users">Users</a></body></html>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(json(200, r#"[{"id": 1}]"#))
        .mount(&mock_server)
        .await;

    let config = config(&[StrategyKind::BruteForce, StrategyKind::Fingerprint]);
    let orchestrator = Orchestrator::new(config, Arc::new(NullSink));
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(request_count(&requests, "GET", "/"), 1);
    assert_eq!(request_count(&requests, "GET", "/api/users"), 1);

    let users = result
        .endpoints
        .iter()
        .find(|e| e.url.ends_with("/api/users"))
        .unwrap();
    assert_eq!(users.response.as_ref().map(|r| r.status), Some(200));
}

/// Records every event and the final result.
#[derive(Default)]
struct RecordingSink {
    stages: Mutex<Vec<ScanStage>>,
    result: Mutex<Option<CrawlResult>>,
}

impl ProgressSink for RecordingSink {
    fn publish_progress(&self, _session: Uuid, progress: &ScanProgress) {
        self.stages.lock().unwrap().push(progress.stage);
    }

    fn publish_result(&self, _session: Uuid, result: &CrawlResult) {
        *self.result.lock().unwrap() = Some(result.clone());
    }
}

struct BrokenMatcher;

impl PatternMatcher for BrokenMatcher {
    fn extract_endpoints(&self, _text: &str) -> Vec<PatternMatch> {
        panic!("matcher state corrupted");
    }

    fn extract_parameters(&self, _url: &Url) -> Vec<Parameter> {
        Vec::new()
    }

    fn detect_methods(&self, _snippet: &str) -> Vec<HttpMethod> {
        Vec::new()
    }
}

#[tokio::test]
async fn test_panic_during_crawl_becomes_session_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(FIXTURE))
        .mount(&mock_server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let browser = Arc::new(FailingBrowser {
        renders: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
    });
    let config = ScannerConfig {
        enable_javascript: true,
        ..config(&[])
    };

    let orchestrator = Orchestrator::new(config, sink.clone())
        .with_browser(browser.clone())
        .with_matcher(Arc::new(BrokenMatcher));
    let err = orchestrator.run(&mock_server.uri()).await.unwrap_err();

    assert!(matches!(err, ScoutError::Session(ref msg) if msg.contains("matcher state corrupted")));
    assert_eq!(sink.stages.lock().unwrap().last(), Some(&ScanStage::Error));
    assert!(!sink.stages.lock().unwrap().contains(&ScanStage::Completed));
    assert!(browser.closed.load(Ordering::SeqCst));

    let published = sink.result.lock().unwrap().clone().expect("partial result published");
    assert!(published.errors.iter().any(|e| e.kind == ErrorKind::Session));
}

/// Serves canned documents the way a browser would report them.
struct StubBrowser {
    closed: AtomicBool,
}

#[async_trait]
impl Browser for StubBrowser {
    async fn render(&self, url: &str, _timeout: Duration) -> ScoutResult<RenderedPage> {
        let parsed = Url::parse(url).map_err(|e| ScoutError::render(url, e))?;
        let (status, content_type, body) = match parsed.path() {
            "/" => (200, "text/html", r#"<html><body><a href="/api/users">Users</a></body></html>"#),
            "/api/users" => (403, "application/json", r#"{"next": "/api/users/archive"}"#),
            _ => (404, "text/html", "<html><body>missing</body></html>"),
        };
        Ok(RenderedPage {
            url: url.to_string(),
            status,
            content_type: content_type.to_string(),
            body: body.to_string(),
            requests: Vec::new(),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_rendered_pages_keep_document_status_and_type() {
    let mock_server = MockServer::start().await;
    let browser = Arc::new(StubBrowser {
        closed: AtomicBool::new(false),
    });
    let config = ScannerConfig {
        enable_javascript: true,
        ..config(&[])
    };

    let orchestrator = Orchestrator::new(config, Arc::new(NullSink)).with_browser(browser.clone());
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    let users = result
        .endpoints
        .iter()
        .find(|e| e.url.ends_with("/api/users"))
        .unwrap();
    assert_eq!(users.response.as_ref().map(|r| r.status), Some(403));

    // the JSON body was walked, not parsed as markup
    assert!(result.endpoints.iter().any(|e| e.url.ends_with("/api/users/archive")));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
    assert!(browser.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_stop_before_run_sends_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(FIXTURE))
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(config(&StrategyKind::all()), Arc::new(NullSink));
    orchestrator.stop_handle().stop();
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    assert_eq!(result.total_pages, 0);
    assert!(result.errors.is_empty());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_during_discovery_skips_remaining_requests() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_millis(50)))
        .mount(&mock_server)
        .await;

    let config = ScannerConfig {
        concurrency: 1,
        ..config(&[StrategyKind::WellKnown])
    };
    let orchestrator = Orchestrator::new(config, Arc::new(NullSink));
    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.stop();
    });

    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.len() <= 10, "{} requests after stop", requests.len());
    assert_eq!(request_count(&requests, "GET", "/"), 0);
    assert_eq!(result.total_pages, 0);
}

#[tokio::test]
async fn test_stop_mid_crawl_drains_in_flight_and_closes_browser() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            html(r#"<html><body><a href="/a/next">next</a></body></html>"#)
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            html(r#"<html><body><a href="/b/next">next</a></body></html>"#)
                .set_delay(Duration::from_millis(600)),
        )
        .mount(&mock_server)
        .await;

    let handle: Arc<OnceLock<StopHandle>> = Arc::new(OnceLock::new());
    let trigger = Arc::clone(&handle);
    let sink = CallbackSink(move |p: &ScanProgress| {
        if p.pages_scanned >= 2 {
            if let Some(stop) = trigger.get() {
                stop.stop();
            }
        }
    });

    let browser = Arc::new(FailingBrowser {
        renders: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
    });
    let config = ScannerConfig {
        enable_javascript: true,
        max_pages: 50,
        ..config(&[])
    };
    let orchestrator = Orchestrator::new(config, Arc::new(sink)).with_browser(browser.clone());
    let _ = handle.set(orchestrator.stop_handle());

    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    assert_eq!(result.total_pages, 3);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(request_count(&requests, "GET", "/b"), 1);
    assert_eq!(request_count(&requests, "GET", "/a/next"), 0);
    assert_eq!(request_count(&requests, "GET", "/b/next"), 0);
    assert!(browser.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_robots_disallow_is_respected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><a href="/private/report">R</a><a href="/public">P</a></body></html>"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(html("<html><body>open</body></html>"))
        .mount(&mock_server)
        .await;

    let config = ScannerConfig {
        respect_robots: true,
        ..config(&[StrategyKind::Robots])
    };
    let orchestrator = Orchestrator::new(config, Arc::new(NullSink));
    orchestrator.run(&mock_server.uri()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(request_count(&requests, "GET", "/public"), 1);
    assert!(requests.iter().all(|r| !r.url.path().starts_with("/private")));
}

#[tokio::test]
async fn test_depth_limited_mode_stops_at_max_depth() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/l1">one</a></body></html>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/l1"))
        .respond_with(html(r#"<html><body><a href="/l2">two</a></body></html>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/l2"))
        .respond_with(html("<html><body>deep</body></html>"))
        .mount(&mock_server)
        .await;

    let config = ScannerConfig {
        crawl_mode: CrawlMode::DepthLimited,
        max_depth: 1,
        ..config(&[])
    };
    let orchestrator = Orchestrator::new(config, Arc::new(NullSink));
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(request_count(&requests, "GET", "/l1"), 1);
    assert_eq!(request_count(&requests, "GET", "/l2"), 0);
    assert_eq!(result.total_pages, 2);
}

#[tokio::test]
async fn test_crawl_delay_spaces_fetches_across_tasks() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#))
        .mount(&mock_server)
        .await;

    let config = ScannerConfig {
        crawl_delay: 200,
        ..config(&[])
    };
    let orchestrator = Orchestrator::new(config, Arc::new(NullSink));
    let result = orchestrator.run(&mock_server.uri()).await.unwrap();

    assert_eq!(result.total_pages, 3);
    // three fetches, each preceded by its own delay slot
    assert!(result.elapsed_ms >= 600, "finished after {}ms", result.elapsed_ms);
}
