use crate::content::{extract_links, extract_main_content};
use crate::error::{Result, ScanError};
use crate::fetch::{RetryPolicy, build_client, get_with_retries};
use crate::relevance::RelevanceScorer;
use crate::result::{CrawlStatus, CrawlSummary, PageResult};
use crate::robots::{ROBOTS_RETRY, ROBOTS_TIMEOUT, RobotsMapping, RobotsPolicy, fetch_robots_txt};
use crate::state::{CrawlCheckpoint, DomainState};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
pub const PAGE_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(500));
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);
pub const CHECKPOINT_EVERY: usize = 10;

pub type ProgressCallback = Arc<dyn Fn(&PageResult) + Send + Sync>;

/// Sequential breadth-first crawler. One request is in flight at a time and
/// every seed is confined to its own host and subdomains.
pub struct Crawler {
    client: Client,
    robots_client: Client,
    scorer: RelevanceScorer,
    retry: RetryPolicy,
    robots_retry: RetryPolicy,
    error_backoff: Duration,
    checkpoint_every: usize,
    checkpoint_path: Option<PathBuf>,
    progress_callback: Option<ProgressCallback>,
    shutdown: Arc<AtomicBool>,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Self::with_timeout(PAGE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            robots_client: build_client(ROBOTS_TIMEOUT)?,
            scorer: RelevanceScorer::new(),
            retry: PAGE_RETRY,
            robots_retry: ROBOTS_RETRY,
            error_backoff: ERROR_BACKOFF,
            checkpoint_every: CHECKPOINT_EVERY,
            checkpoint_path: None,
            progress_callback: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_scorer(mut self, scorer: RelevanceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Applies to both page and robots.txt requests.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.robots_retry = retry;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn with_checkpoint_every(mut self, pages: usize) -> Self {
        self.checkpoint_every = pages.max(1);
        self
    }

    pub fn with_checkpoint_path(mut self, path: PathBuf) -> Self {
        self.checkpoint_path = Some(path);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Share an externally owned stop flag, e.g. one flipped by a Ctrl-C handler.
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Fetch robots.txt for every seed, one line per base URL.
    pub async fn fetch_robots(&self, seeds: &[String]) -> RobotsMapping {
        let mut mapping = RobotsMapping::new();
        for seed in seeds {
            let text = fetch_robots_txt(&self.robots_client, seed, self.robots_retry).await;
            mapping.insert(seed.clone(), text);
        }
        mapping
    }

    /// Crawl each seed in order, resuming from whatever `checkpoint` holds.
    /// Stops early (with the checkpoint flushed) once a shutdown is requested.
    pub async fn crawl(
        &self,
        seeds: &[String],
        robots: &RobotsMapping,
        checkpoint: &mut CrawlCheckpoint,
    ) -> Result<Vec<CrawlSummary>> {
        let mut summaries = Vec::new();
        for seed in seeds {
            let policy = RobotsPolicy::parse(robots.get(seed).map(String::as_str).unwrap_or(""));
            let summary = self.crawl_seed(seed, &policy, checkpoint).await?;
            let interrupted = summary.status == CrawlStatus::Interrupted;
            summaries.push(summary);
            if interrupted {
                break;
            }
        }
        Ok(summaries)
    }

    pub async fn crawl_seed(
        &self,
        seed: &str,
        robots: &RobotsPolicy,
        checkpoint: &mut CrawlCheckpoint,
    ) -> Result<CrawlSummary> {
        let parsed = Url::parse(seed).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed, e)))?;
        let base_domain = parsed
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: no host", seed)))?
            .to_string();

        let mut state = checkpoint.domain_state(seed);
        let mut pages = Vec::new();
        let mut since_flush = 0;
        let mut status = CrawlStatus::Completed;
        info!("Starting crawl of {} ({} URLs queued)", seed, state.frontier().len());

        loop {
            if self.stop_requested() {
                info!("Shutdown requested, stopping crawl of {}", seed);
                status = CrawlStatus::Interrupted;
                break;
            }
            let Some(url) = state.next_url() else {
                break;
            };
            if state.is_visited(&url) {
                continue;
            }
            if !robots.is_allowed(&url) {
                info!("Skipping {} due to robots.txt", url);
                continue;
            }

            state.mark_visited(&url);
            let result = self.visit(&url, &base_domain, robots, &mut state).await;
            if result.relevant {
                since_flush += 1;
            }
            if result.error.is_some() {
                tokio::time::sleep(self.error_backoff).await;
            }

            checkpoint.store(seed, &state);
            if since_flush >= self.checkpoint_every {
                self.flush(checkpoint);
                since_flush = 0;
            }
            if let Some(ref callback) = self.progress_callback {
                callback(&result);
            }
            pages.push(result);
        }

        checkpoint.store(seed, &state);
        self.flush(checkpoint);
        info!(
            "Finished {}: {} visited, {} relevant, {} left in queue",
            seed,
            state.visited().len(),
            state.relevant().len(),
            state.frontier().len()
        );

        Ok(CrawlSummary {
            seed: seed.to_string(),
            status,
            pages,
            visited: state.visited().len(),
            relevant: state.relevant().len(),
            remaining: state.frontier().len(),
        })
    }

    /// Fetch one page, score it, and queue its allowed same-domain links.
    /// A failed fetch only produces an errored result; the URL stays visited
    /// and is never retried.
    async fn visit(&self, url: &str, base_domain: &str, robots: &RobotsPolicy, state: &mut DomainState) -> PageResult {
        debug!("Fetching {}", url);
        let start = Instant::now();
        let response = match get_with_retries(&self.client, url, self.retry).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Error crawling {}: {}", url, e);
                return PageResult::with_error(url.to_string(), e.to_string());
            }
        };

        let mut result = PageResult::new(url.to_string());
        result.status_code = response.status().as_u16();
        if result.status_code != 200 {
            warn!("Received status code {} for {}", result.status_code, url);
            result.response_time = start.elapsed();
            return result;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Error reading body of {}: {}", url, e);
                result.error = Some(e.to_string());
                return result;
            }
        };
        result.response_time = start.elapsed();

        let score = self.scorer.score(&extract_main_content(&body));
        result.score = Some(score);
        if score >= self.scorer.threshold() && state.mark_relevant(url) {
            result.relevant = true;
            info!("Relevant page found: {} (score {})", url, score);
        }

        for link in extract_links(&body, url, base_domain) {
            if !robots.is_allowed(&link) {
                debug!("Not queueing {} due to robots.txt", link);
                continue;
            }
            if state.enqueue(link) {
                result.links_queued += 1;
            }
        }
        result
    }

    fn flush(&self, checkpoint: &CrawlCheckpoint) {
        if let Some(ref path) = self.checkpoint_path
            && let Err(e) = checkpoint.save(path)
        {
            warn!("Failed to save checkpoint to {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const RELEVANT_BODY: &str = "<html><body><main>CPT and OPT guide. Curricular practical training \
        and optional practical training need work authorization.</main></body></html>";

    async fn page(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    fn test_crawler() -> Crawler {
        Crawler::new()
            .unwrap()
            .with_retry_policy(RetryPolicy::immediate(1))
            .with_error_backoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_breadth_first_crawl_honors_robots_and_domain() {
        let server = MockServer::start().await;
        let uri = server.uri();
        page(
            &server,
            "/",
            r#"<html><body><a href="/opt">OPT</a><a href="/about">About</a>
               <a href="/private/x">Hidden</a><a href="https://elsewhere.example/cpt">Other</a></body></html>"#
                .to_string(),
        )
        .await;
        page(&server, "/opt", RELEVANT_BODY.to_string()).await;
        page(&server, "/about", "<html><body>Contact us</body></html>".to_string()).await;
        Mock::given(method("GET"))
            .and(path("/private/x"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let seeds = vec![uri.clone()];
        let mut checkpoint = CrawlCheckpoint::fresh(&seeds);
        let policy = RobotsPolicy::parse("User-agent: * Disallow: /private");
        let summary = test_crawler().crawl_seed(&uri, &policy, &mut checkpoint).await.unwrap();

        assert_eq!(summary.status, CrawlStatus::Completed);
        assert_eq!(summary.visited, 3);
        assert_eq!(summary.relevant, 1);
        assert_eq!(summary.remaining, 0);
        let order: Vec<&str> = summary.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(order, vec![format!("{uri}/"), format!("{uri}/opt"), format!("{uri}/about")]);
        assert_eq!(checkpoint.relevant_for(&seeds), vec![format!("{uri}/opt")]);
    }

    #[tokio::test]
    async fn test_resume_skips_visited_pages() {
        let server = MockServer::start().await;
        let uri = server.uri();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        page(&server, "/opt", RELEVANT_BODY.to_string()).await;

        let seeds = vec![uri.clone()];
        let mut checkpoint = CrawlCheckpoint::default();
        checkpoint.store(
            &uri,
            &DomainState::from_parts(vec![format!("{uri}/")], vec![format!("{uri}/opt")], vec![]),
        );

        let summary = test_crawler()
            .crawl_seed(&uri, &RobotsPolicy::default(), &mut checkpoint)
            .await
            .unwrap();
        assert_eq!(summary.pages.len(), 1);
        assert_eq!(summary.visited, 2);
        assert_eq!(checkpoint.relevant_for(&seeds), vec![format!("{uri}/opt")]);
    }

    #[tokio::test]
    async fn test_interrupt_flushes_untouched_state() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("crawler_state.json");
        let seeds = vec!["https://iso.mit.edu".to_string()];
        let mut checkpoint = CrawlCheckpoint::fresh(&seeds);
        let before = checkpoint.clone();

        let crawler = test_crawler().with_checkpoint_path(state_path.clone());
        crawler.shutdown_handle().store(true, Ordering::SeqCst);
        let summaries = crawler
            .crawl(&seeds, &RobotsMapping::new(), &mut checkpoint)
            .await
            .unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].status, CrawlStatus::Interrupted);
        assert!(summaries[0].pages.is_empty());
        assert_eq!(CrawlCheckpoint::load(&state_path).unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_urls_are_dropped() {
        let server = MockServer::start().await;
        let uri = server.uri();
        page(
            &server,
            "/",
            r#"<html><body><a href="/broken">Broken</a><a href="/opt">OPT</a></body></html>"#.to_string(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        page(
            &server,
            "/opt",
            r#"<html><body><a href="/broken">Broken again</a>CPT</body></html>"#.to_string(),
        )
        .await;

        let mut checkpoint = CrawlCheckpoint::fresh(&[uri.clone()]);
        let summary = test_crawler()
            .crawl_seed(&uri, &RobotsPolicy::default(), &mut checkpoint)
            .await
            .unwrap();

        assert_eq!(summary.status, CrawlStatus::Completed);
        assert_eq!(summary.visited, 3);
        let broken = summary.pages.iter().find(|p| p.url.ends_with("/broken")).unwrap();
        assert_eq!(broken.status_code, 500);
        assert!(!broken.relevant);
    }

    #[tokio::test]
    async fn test_checkpoint_flushed_after_relevant_batch() {
        let server = MockServer::start().await;
        let uri = server.uri();
        page(&server, "/", RELEVANT_BODY.replace("</main>", r#"<a href="/next">n</a></main>"#)).await;
        page(&server, "/next", "<html><body>Nothing here</body></html>".to_string()).await;

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("crawler_state.json");
        let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let path_cb = state_path.clone();

        let crawler = test_crawler()
            .with_checkpoint_every(1)
            .with_checkpoint_path(state_path.clone())
            .with_progress_callback(Arc::new(move |result: &PageResult| {
                seen_cb.lock().unwrap().push((result.url.clone(), path_cb.exists()));
            }));

        let mut checkpoint = CrawlCheckpoint::fresh(&[uri.clone()]);
        crawler
            .crawl_seed(&uri, &RobotsPolicy::default(), &mut checkpoint)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (format!("{uri}/"), true));
        let saved = CrawlCheckpoint::load(&state_path).unwrap().unwrap();
        assert_eq!(saved.relevant_for(&[uri.clone()]), vec![format!("{uri}/")]);
        assert!(saved.to_visit[&uri].is_empty());
    }

    #[tokio::test]
    async fn test_fetch_robots_per_seed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /x"))
            .mount(&server)
            .await;

        let seeds = vec![server.uri()];
        let mapping = test_crawler().fetch_robots(&seeds).await;
        assert_eq!(mapping[&server.uri()], "User-agent: * Disallow: /x");
    }

    #[tokio::test]
    async fn test_invalid_seed_is_an_error() {
        let mut checkpoint = CrawlCheckpoint::default();
        let err = test_crawler()
            .crawl_seed("not a url", &RobotsPolicy::default(), &mut checkpoint)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
    }
}
