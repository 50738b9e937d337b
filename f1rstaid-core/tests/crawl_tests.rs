// Tests for crawl orchestration

use f1rstaid_core::crawl::{CrawlOptions, execute_crawl, extract_url_path, generate_crawl_report};
use f1rstaid_scanner::robots::load_robots_mapping;
use f1rstaid_scanner::{CrawlCheckpoint, CrawlStatus};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const RELEVANT_BODY: &str = "<main>CPT and OPT guide. Curricular practical training and optional \
    practical training need work authorization.</main>";

async fn page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!("<html><body>{}</body></html>", body)),
        )
        .mount(server)
        .await;
}

fn options(dir: &Path, seed: &str) -> CrawlOptions {
    CrawlOptions {
        seeds: vec![seed.to_string()],
        resume: true,
        robots_mapping_file: dir.join("websites_robots.json"),
        checkpoint_file: dir.join("crawler_state.json"),
        relevant_urls_file: dir.join("relevant_urls.txt"),
        show_progress_bars: false,
        error_backoff: Some(Duration::ZERO),
        shutdown: None,
    }
}

// ============================================================================
// URL Path Extraction Tests
// ============================================================================

#[test]
fn test_extract_url_path_root() {
    assert_eq!(extract_url_path("https://www.cmu.edu"), "/");
    assert_eq!(extract_url_path("https://www.cmu.edu/"), "/");
}

#[test]
fn test_extract_url_path_nested_with_query() {
    assert_eq!(extract_url_path("https://iso.mit.edu/americas/opt?tab=2#apply"), "/americas/opt");
}

// ============================================================================
// End-to-end crawl
// ============================================================================

#[tokio::test]
async fn test_execute_crawl_writes_all_outputs() {
    let server = MockServer::start().await;
    let seed = server.uri();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
        .mount(&server)
        .await;
    page(&server, "/", "<a href='/opt'>OPT</a> <a href='/about'>About</a> <a href='/private/x'>x</a>").await;
    page(&server, "/opt", RELEVANT_BODY).await;
    page(&server, "/about", "<main>Contact us about campus events.</main>").await;
    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let outcome = execute_crawl(options(dir.path(), &seed)).await.unwrap();

    assert!(!outcome.interrupted());
    assert_eq!(outcome.relevant_urls, vec![format!("{}/opt", seed)]);
    assert_eq!(
        fs::read_to_string(dir.path().join("relevant_urls.txt")).unwrap(),
        format!("{}/opt\n", seed)
    );

    let robots = load_robots_mapping(&dir.path().join("websites_robots.json")).unwrap();
    assert_eq!(robots.get(&seed).map(String::as_str), Some("User-agent: * Disallow: /private"));

    let checkpoint = CrawlCheckpoint::load(&dir.path().join("crawler_state.json"))
        .unwrap()
        .unwrap();
    let state = checkpoint.domain_state(&seed);
    assert_eq!(state.visited().len(), 3);
    assert!(state.frontier().is_empty());

    let report = generate_crawl_report(&outcome.summaries);
    assert!(report.contains("Relevant pages: 1"));
    assert!(report.contains("/opt"));
}

#[tokio::test]
async fn test_resume_disabled_starts_fresh() {
    let server = MockServer::start().await;
    let seed = server.uri();
    page(&server, "/", RELEVANT_BODY).await;

    let dir = TempDir::new().unwrap();
    let mut stale = CrawlCheckpoint::fresh(&[seed.clone()]);
    let mut state = stale.domain_state(&seed);
    while state.next_url().is_some() {}
    stale.store(&seed, &state);
    stale.save(&dir.path().join("crawler_state.json")).unwrap();

    let mut opts = options(dir.path(), &seed);
    opts.resume = false;
    let outcome = execute_crawl(opts).await.unwrap();

    assert_eq!(outcome.summaries[0].pages.len(), 1);
    assert_eq!(outcome.relevant_urls.len(), 1);
}

#[tokio::test]
async fn test_shutdown_before_start_keeps_frontier() {
    let server = MockServer::start().await;
    let seed = server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut opts = options(dir.path(), &seed);
    opts.shutdown = Some(Arc::new(AtomicBool::new(true)));
    let outcome = execute_crawl(opts).await.unwrap();

    assert!(outcome.interrupted());
    assert_eq!(outcome.summaries[0].status, CrawlStatus::Interrupted);
    assert_eq!(outcome.summaries[0].remaining, 1);
    assert!(outcome.relevant_urls.is_empty());
    assert!(dir.path().join("crawler_state.json").exists());
}
