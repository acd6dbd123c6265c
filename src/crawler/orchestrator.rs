use futures::future::join_all;
use futures::{FutureExt, StreamExt};
use futures::stream::FuturesUnordered;
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use super::{Frontier, FrontierItem, LinkPolicy, ProgressSink, Target};
use crate::config::{CrawlMode, ScannerConfig};
use crate::discovery::{
    DiscoveryContext, DiscoveryOutcome, DiscoveryStrategy, PredictionStrategy, ProbeKind,
    ProbeLedger, StrategyKind, initial_strategies,
};
use crate::error::{Result, ScoutError};
use crate::extractor::{
    ContentExtractor, EndpointCandidate, Extraction, PatternMatcher, RegexPatternMatcher, resolve_url,
};
use crate::fetch::{Browser, ChromeBrowser, FetchMode, Fetcher, Page};
use crate::http::{HttpClient, RateLimiter};
use crate::models::{
    CrawlError, CrawlResult, CrawlStats, ErrorKind, HttpMethod, ResponseMeta, ScanProgress, ScanStage, Source,
};
use crate::registry::EndpointRegistry;

const MAX_SCRIPTS: usize = 250;
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Asks a running session to stop admitting work and release its browser.
/// Fetches already in flight run to completion.
#[derive(Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn stopped(&self) {
        if !self.is_stopped() {
            self.notify.notified().await;
        }
    }
}

/// Publishes progress snapshots, keeping them monotonic.
struct ProgressTracker {
    session: Uuid,
    sink: Arc<dyn ProgressSink>,
    state: ScanProgress,
}

impl ProgressTracker {
    fn new(session: Uuid, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            session,
            sink,
            state: ScanProgress::initial(),
        }
    }

    fn update(
        &mut self,
        stage: ScanStage,
        progress: u8,
        pages: usize,
        endpoints: usize,
        current_url: Option<String>,
        message: impl Into<String>,
    ) {
        self.state.advance(stage, progress, pages, endpoints);
        self.state.current_url = current_url;
        self.state.message = message.into();
        self.sink.publish_progress(self.session, &self.state);
    }

    fn fail(&mut self, err: &ScoutError) {
        let (pages, endpoints, progress) = (
            self.state.pages_scanned,
            self.state.endpoints_found,
            self.state.progress,
        );
        self.update(ScanStage::Error, progress, pages, endpoints, None, err.to_string());
    }
}

/// Result of one crawl task, folded back into the session by the loop.
struct CrawledPage {
    item: FrontierItem,
    outcome: Result<(Page, Extraction)>,
}

/// Static fetches go through the ledger, so a URL a discovery probe already
/// requested is served from its response. A rendered fetch reuses a settled
/// non-HTML response and sends everything else to the browser.
async fn fetch_page(fetcher: &Fetcher, ledger: &ProbeLedger, url: &Url, mode: FetchMode) -> Result<Page> {
    if mode == FetchMode::Rendered && fetcher.can_render() {
        let reusable = ledger
            .cached(url, ProbeKind::Get)
            .filter(|r| r.content_type().is_some_and(|ct| !ct.contains("html")));
        return match reusable {
            Some(response) => Ok(Page::from_response((*response).clone())),
            None => fetcher.fetch(url.as_str(), FetchMode::Rendered).await,
        };
    }

    let response = ledger.fetch(fetcher, url, ProbeKind::Get).await?;
    Ok(Page::from_response((*response).clone()))
}

async fn crawl_page(
    fetcher: Arc<Fetcher>,
    ledger: Arc<ProbeLedger>,
    extractor: Arc<ContentExtractor>,
    item: FrontierItem,
    mode: FetchMode,
    start_at: Option<tokio::time::Instant>,
) -> CrawledPage {
    if let Some(at) = start_at {
        tokio::time::sleep_until(at).await;
    }

    let outcome = fetch_page(&fetcher, &ledger, &item.url, mode).await.map(|page| {
        let base = Url::parse(&page.url).unwrap_or_else(|_| item.url.clone());
        let extraction = extractor.extract(&page.body, page.content_type(), &base);
        (page, extraction)
    });

    CrawledPage { item, outcome }
}

/// Mutable state of one run. Owned by the orchestrator loop; crawl tasks only
/// hand results back to it.
struct CrawlSession {
    target: Target,
    config: ScannerConfig,
    fetcher: Arc<Fetcher>,
    extractor: Arc<ContentExtractor>,
    policy: LinkPolicy,
    frontier: Frontier,
    registry: EndpointRegistry,
    ledger: Arc<ProbeLedger>,
    errors: Vec<CrawlError>,
    scripts: BTreeMap<String, usize>,
    scripts_analyzed: usize,
    domains: HashSet<String>,
    response_times: Vec<u64>,
    pages_done: usize,
    stop: StopHandle,
}

impl CrawlSession {
    fn new(
        target: Target,
        config: ScannerConfig,
        fetcher: Arc<Fetcher>,
        matcher: Arc<dyn PatternMatcher>,
        stop: StopHandle,
    ) -> Self {
        let max_depth = match config.crawl_mode {
            CrawlMode::Breadth => None,
            CrawlMode::DepthLimited => Some(config.max_depth),
        };

        Self {
            frontier: Frontier::new(&target.base, max_depth),
            policy: LinkPolicy::new(config.include_external_links),
            extractor: Arc::new(ContentExtractor::new(Arc::clone(&matcher), config.json_walk_depth)),
            registry: EndpointRegistry::new(matcher),
            ledger: Arc::new(ProbeLedger::new()),
            errors: Vec::new(),
            scripts: BTreeMap::new(),
            scripts_analyzed: 0,
            domains: HashSet::new(),
            response_times: Vec::new(),
            pages_done: 0,
            stop,
            target,
            config,
            fetcher,
        }
    }

    fn log_error(&mut self, url: &str, err: &ScoutError) {
        let Some(kind) = err.log_kind() else {
            return;
        };
        if kind == ErrorKind::Network {
            debug!("[Crawler] {}", err);
        } else {
            warn!("[Crawler] {}", err);
        }
        self.errors.push(CrawlError::new(url, kind, err.to_string()));
    }

    fn discovery_context(&self) -> DiscoveryContext {
        DiscoveryContext::new(
            self.target.base.clone(),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.ledger),
            self.config.concurrency,
        )
        .with_stop(self.stop.clone())
    }

    async fn run_strategies(
        &mut self,
        ctx: &DiscoveryContext,
        strategies: Vec<Box<dyn DiscoveryStrategy>>,
    ) -> Vec<DiscoveryOutcome> {
        let settled = join_all(strategies.iter().map(|strategy| async move {
            let started = Instant::now();
            let result = strategy.discover(ctx).await;
            (strategy.kind(), result, started.elapsed())
        }))
        .await;

        let mut outcomes = Vec::new();
        for (kind, result, elapsed) in settled {
            match result {
                Ok(outcome) => {
                    debug!(
                        "[Discovery] {} finished in {}ms: {} seeds, {} endpoints",
                        kind,
                        elapsed.as_millis(),
                        outcome.seeds.len(),
                        outcome.endpoints.len()
                    );
                    outcomes.push(outcome);
                }
                Err(err) => {
                    let err = match err {
                        e @ ScoutError::Strategy { .. } => e,
                        other => ScoutError::strategy(kind.name(), other),
                    };
                    let url = self.target.base.to_string();
                    self.log_error(&url, &err);
                }
            }
        }
        outcomes
    }

    fn record_discovered(&mut self, outcome: &DiscoveryOutcome, depth: usize) {
        for found in &outcome.endpoints {
            if self
                .registry
                .record(&found.url, found.method, found.source, depth)
                .is_none()
            {
                continue;
            }
            if let Some(meta) = found.response {
                self.registry.observe(&found.url, found.method, meta, depth);
            }
            if !found.headers.is_empty() {
                self.registry
                    .attach_headers(found.method, &found.url, found.headers.clone());
            }
        }
    }

    async fn discover(&mut self, tracker: &mut ProgressTracker) {
        tracker.update(ScanStage::Initializing, 2, 0, 0, None, "Running discovery strategies");

        self.frontier.push(self.target.base.clone(), 0);

        let strategies = initial_strategies(&self.config.strategies);
        if strategies.is_empty() || self.stop.is_stopped() {
            return;
        }

        let ctx = self.discovery_context();
        let outcomes = self.run_strategies(&ctx, strategies).await;

        if self.config.respect_robots {
            for outcome in &outcomes {
                self.frontier.disallow(outcome.disallowed.iter().cloned());
            }
        }

        for outcome in &outcomes {
            self.record_discovered(outcome, 0);
            for seed in &outcome.seeds {
                if self.policy.admits_seed(seed) {
                    self.frontier.push(seed.clone(), 1);
                }
            }
        }

        info!(
            "[Discovery] {} seeds queued, {} endpoints, {} probes",
            self.frontier.pending(),
            self.registry.len(),
            self.ledger.len()
        );
        tracker.update(
            ScanStage::Initializing,
            10,
            0,
            self.registry.len(),
            None,
            format!("Discovery finished with {} seeds", self.frontier.pending()),
        );
    }

    fn absorb_page(&mut self, crawled: CrawledPage) {
        let CrawledPage { item, outcome } = crawled;
        self.pages_done += 1;

        let (mut page, extraction) = match outcome {
            Ok(done) => done,
            Err(err) => {
                self.log_error(item.url.as_str(), &err);
                return;
            }
        };

        if let Some(err) = page.render_error.take() {
            self.log_error(item.url.as_str(), &err);
        }

        let base = Url::parse(&page.url).unwrap_or_else(|_| item.url.clone());
        if let Some(host) = base.host_str() {
            self.domains.insert(host.to_string());
        }
        self.response_times.push(page.duration_ms);

        let meta = ResponseMeta {
            status: page.status,
            size: page.body.len(),
            duration_ms: page.duration_ms,
        };
        self.registry
            .observe(item.url.as_str(), HttpMethod::Get, meta, item.depth);

        for request in &page.observed {
            if let Some(url) = resolve_url(&base, &request.url) {
                let candidate = EndpointCandidate::new(url.as_str(), request.method, Source::ScriptAnalysis);
                self.registry.admit(&candidate, item.depth);
            }
        }

        for candidate in &extraction.candidates {
            self.registry.admit(candidate, item.depth);
        }

        for link in &extraction.links {
            if !self.policy.should_follow(link, &base) {
                continue;
            }
            if let Ok(url) = Url::parse(link) {
                self.frontier.push(url, item.depth + 1);
            }
        }

        for script in extraction.scripts {
            let same_origin = Url::parse(&script)
                .map(|u| u.origin() == self.target.base.origin())
                .unwrap_or(false);
            if same_origin && self.scripts.len() < MAX_SCRIPTS {
                self.scripts.entry(script).or_insert(item.depth);
            }
        }
    }

    fn crawl_progress(&self) -> u8 {
        let horizon = (self.frontier.visited_count() + self.frontier.pending())
            .min(self.config.max_pages)
            .max(1);
        let done = self.pages_done.min(horizon);
        (10 + done * 60 / horizon) as u8
    }

    async fn crawl(&mut self, tracker: &mut ProgressTracker) {
        let stop = self.stop.clone();
        let mode = if self.config.enable_javascript {
            FetchMode::Rendered
        } else {
            FetchMode::Static
        };
        let delay = self.config.crawl_delay_duration();
        let concurrency = self.config.concurrency.max(1);
        let mut active = FuturesUnordered::new();
        let mut stop_seen = false;
        // fetch starts are spaced by the crawl delay across all tasks
        let mut next_slot = tokio::time::Instant::now();

        tracker.update(
            ScanStage::Crawling,
            10,
            0,
            self.registry.len(),
            Some(self.target.base.to_string()),
            "Crawling",
        );

        loop {
            while !stop.is_stopped()
                && active.len() < concurrency
                && self.frontier.visited_count() < self.config.max_pages
            {
                let Some(item) = self.frontier.pop() else {
                    break;
                };
                let start_at = if delay.is_zero() {
                    None
                } else {
                    next_slot = next_slot.max(tokio::time::Instant::now()) + delay;
                    Some(next_slot)
                };
                active.push(crawl_page(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.ledger),
                    Arc::clone(&self.extractor),
                    item,
                    mode,
                    start_at,
                ));
            }

            if active.is_empty() {
                break;
            }

            tokio::select! {
                Some(crawled) = active.next() => {
                    let url = crawled.item.url.to_string();
                    self.absorb_page(crawled);
                    tracker.update(
                        ScanStage::Crawling,
                        self.crawl_progress(),
                        self.pages_done,
                        self.registry.len(),
                        Some(url),
                        format!("Crawled {} pages", self.pages_done),
                    );
                }
                _ = stop.stopped(), if !stop_seen => {
                    stop_seen = true;
                    info!("[Crawler] Stop requested, draining {} in-flight fetches", active.len());
                    self.frontier.clear();
                    self.fetcher.shutdown().await;
                }
            }
        }

        info!(
            "[Crawler] Crawl finished: {} pages, {} endpoints",
            self.frontier.visited_count(),
            self.registry.len()
        );
    }

    /// Fetches the same-origin scripts gathered while crawling and scans them.
    async fn analyze_scripts(&mut self, tracker: &mut ProgressTracker) {
        let scripts = std::mem::take(&mut self.scripts);
        tracker.update(
            ScanStage::Analyzing,
            75,
            self.pages_done,
            self.registry.len(),
            None,
            format!("Analysing {} scripts", scripts.len()),
        );
        if scripts.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let fetcher = Arc::clone(&self.fetcher);
        let ledger = Arc::clone(&self.ledger);
        let fetches = scripts
            .into_iter()
            .filter_map(|(url, depth)| Url::parse(&url).ok().map(|url| (url, depth)))
            .map(|(url, depth)| {
                let semaphore = Arc::clone(&semaphore);
                let fetcher = Arc::clone(&fetcher);
                let ledger = Arc::clone(&ledger);
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result = ledger.fetch(&fetcher, &url, ProbeKind::Get).await;
                    (url, depth, result)
                }
            });

        for (url, depth, result) in join_all(fetches).await {
            match result {
                Ok(response) => {
                    let base = Url::parse(&response.url).unwrap_or_else(|_| url.clone());
                    let candidates =
                        self.extractor
                            .extract_script(&response.body, &base, Source::ScriptAnalysis);
                    for candidate in &candidates {
                        self.registry.admit(candidate, depth);
                    }
                    self.scripts_analyzed += 1;
                }
                Err(err) => self.log_error(url.as_str(), &err),
            }
        }

        debug!("[Crawler] {} scripts analysed", self.scripts_analyzed);
    }

    async fn predict(&mut self, tracker: &mut ProgressTracker) {
        tracker.update(
            ScanStage::Processing,
            85,
            self.pages_done,
            self.registry.len(),
            None,
            "Predicting routes",
        );
        if self.stop.is_stopped() || !self.config.strategy_enabled(StrategyKind::Prediction) {
            return;
        }

        let ctx = self.discovery_context().with_known(self.registry.snapshot());
        let prediction: Vec<Box<dyn DiscoveryStrategy>> =
            vec![Box::new(PredictionStrategy::new(self.config.max_predictions))];
        for outcome in self.run_strategies(&ctx, prediction).await {
            self.record_discovered(&outcome, 1);
        }
    }

    async fn execute(&mut self, tracker: &mut ProgressTracker) {
        self.discover(tracker).await;
        self.crawl(tracker).await;
        if !self.stop.is_stopped() {
            self.analyze_scripts(tracker).await;
        }
        self.predict(tracker).await;
    }

    fn finish(self, elapsed: Duration) -> CrawlResult {
        let endpoints = self.registry.snapshot();
        let stats = CrawlStats::from_session(
            &endpoints,
            &self.domains,
            &self.response_times,
            self.fetcher.http().limiter().issued(),
            self.scripts_analyzed,
        );

        CrawlResult {
            domain: self.target.domain,
            endpoints,
            total_pages: self.frontier.visited_count(),
            elapsed_ms: elapsed.as_millis() as u64,
            errors: self.errors,
            stats,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs crawl sessions.
pub struct Orchestrator {
    config: ScannerConfig,
    sink: Arc<dyn ProgressSink>,
    browser: Option<Arc<dyn Browser>>,
    matcher: Arc<dyn PatternMatcher>,
    stop: StopHandle,
    session_id: Uuid,
}

impl Orchestrator {
    pub fn new(config: ScannerConfig, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            config: config.sanitized(),
            sink,
            browser: None,
            matcher: Arc::new(RegexPatternMatcher::new()),
            stop: StopHandle::default(),
            session_id: Uuid::new_v4(),
        }
    }

    /// Uses `browser` for rendered fetches instead of launching Chrome.
    pub fn with_browser(mut self, browser: Arc<dyn Browser>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn PatternMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Crawls `domain` and returns the final result, which is also published
    /// to the sink. Only validation and session errors are returned.
    pub async fn run(&self, domain: &str) -> Result<CrawlResult> {
        let started = Instant::now();
        let mut tracker = ProgressTracker::new(self.session_id, Arc::clone(&self.sink));

        let target = match Target::parse(domain) {
            Ok(target) => target,
            Err(err) => return Err(self.abort(&mut tracker, domain, err, started)),
        };

        let limiter = Arc::new(RateLimiter::new(self.config.requests_per_second));
        let http = match HttpClient::new(&self.config.user_agent, self.config.timeout_duration(), limiter) {
            Ok(http) => Arc::new(http),
            Err(err) => return Err(self.abort(&mut tracker, &target.domain, err, started)),
        };

        let browser = if self.config.enable_javascript {
            Some(self.browser.clone().unwrap_or_else(|| {
                Arc::new(ChromeBrowser::new(BROWSER_IDLE_TIMEOUT)) as Arc<dyn Browser>
            }))
        } else {
            None
        };
        let fetcher = Arc::new(Fetcher::new(http, browser, self.config.timeout_duration()));

        info!("[Crawler] Session {} started for {}", self.session_id, target.base);
        let domain = target.domain.clone();
        let mut session = CrawlSession::new(
            target,
            self.config.clone(),
            Arc::clone(&fetcher),
            Arc::clone(&self.matcher),
            self.stop.clone(),
        );

        let executed = AssertUnwindSafe(session.execute(&mut tracker))
            .catch_unwind()
            .await;
        fetcher.shutdown().await;

        if let Err(panic) = executed {
            let err = ScoutError::Session(format!("crawl stage panicked: {}", panic_message(panic.as_ref())));
            return Err(self.abort(&mut tracker, &domain, err, started));
        }

        let result = session.finish(started.elapsed());
        tracker.update(
            ScanStage::Completed,
            100,
            result.total_pages,
            result.endpoints.len(),
            None,
            format!(
                "Found {} endpoints across {} pages",
                result.endpoints.len(),
                result.total_pages
            ),
        );
        self.sink.publish_result(self.session_id, &result);

        info!(
            "[Crawler] Session {} completed in {}ms with {} errors",
            self.session_id,
            result.elapsed_ms,
            result.errors.len()
        );
        Ok(result)
    }

    fn abort(&self, tracker: &mut ProgressTracker, domain: &str, err: ScoutError, started: Instant) -> ScoutError {
        error!("[Crawler] Session {} aborted: {}", self.session_id, err);
        tracker.fail(&err);

        let errors = err
            .log_kind()
            .map(|kind| vec![CrawlError::new(domain, kind, err.to_string())])
            .unwrap_or_default();
        let result = CrawlResult {
            domain: domain.to_string(),
            endpoints: Vec::new(),
            total_pages: 0,
            elapsed_ms: started.elapsed().as_millis() as u64,
            errors,
            stats: CrawlStats::default(),
        };
        self.sink.publish_result(self.session_id, &result);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::NullSink;

    #[tokio::test]
    async fn test_stop_handle_resolves_after_stop() {
        let handle = StopHandle::default();
        let clone = handle.clone();
        clone.stop();
        assert!(handle.is_stopped());
        tokio::time::timeout(Duration::from_secs(1), handle.stopped())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_domain_fails_validation() {
        let orchestrator = Orchestrator::new(ScannerConfig::default(), Arc::new(NullSink));
        let err = orchestrator.run("not a domain!!").await.unwrap_err();
        assert!(matches!(err, ScoutError::Validation(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_panic_message_from_payload() {
        let payload: Box<dyn Any + Send> = Box::new("matcher blew up");
        assert_eq!(panic_message(payload.as_ref()), "matcher blew up");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_config_is_sanitized() {
        let config = ScannerConfig {
            concurrency: 0,
            ..ScannerConfig::default()
        };
        let orchestrator = Orchestrator::new(config, Arc::new(NullSink));
        assert_eq!(orchestrator.config().concurrency, 1);
    }
}
