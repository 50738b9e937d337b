use crate::config::Settings;
use crate::error::Result;
use f1rstaid_scanner::crawler::ProgressCallback;
use f1rstaid_scanner::result::PageResult;
use f1rstaid_scanner::robots::save_robots_mapping;
use f1rstaid_scanner::state::write_relevant_urls;
use f1rstaid_scanner::{CrawlCheckpoint, CrawlStatus, CrawlSummary, Crawler};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub seeds: Vec<String>,
    /// Load the checkpoint file when it exists instead of starting fresh.
    pub resume: bool,
    pub robots_mapping_file: PathBuf,
    pub checkpoint_file: PathBuf,
    pub relevant_urls_file: PathBuf,
    pub show_progress_bars: bool,
    pub error_backoff: Option<Duration>,
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl CrawlOptions {
    pub fn from_settings(settings: &Settings, seeds: Vec<String>) -> Self {
        Self {
            seeds,
            resume: true,
            robots_mapping_file: settings.robots_mapping_file.clone(),
            checkpoint_file: settings.checkpoint_file.clone(),
            relevant_urls_file: settings.relevant_urls_file.clone(),
            show_progress_bars: false,
            error_backoff: None,
            shutdown: None,
        }
    }
}

#[derive(Debug)]
pub struct CrawlOutcome {
    pub summaries: Vec<CrawlSummary>,
    pub relevant_urls: Vec<String>,
}

impl CrawlOutcome {
    pub fn interrupted(&self) -> bool {
        self.summaries
            .iter()
            .any(|summary| summary.status == CrawlStatus::Interrupted)
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() { "/".to_string() } else { path }
        })
        .unwrap_or_else(|| url.to_string())
}

fn spinner_callback(pb: Arc<ProgressBar>) -> ProgressCallback {
    let processed = Arc::new(AtomicUsize::new(0));
    let relevant = Arc::new(AtomicUsize::new(0));
    Arc::new(move |page: &PageResult| {
        let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
        let found = if page.relevant {
            relevant.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            relevant.load(Ordering::Relaxed)
        };
        pb.set_message(format!("Crawling... {} pages processed, {} relevant", count, found));
        pb.tick();
    })
}

/// Run the crawler over every seed: fetch and persist robots.txt, resume or
/// start the checkpoint, crawl, then write the relevant URL list.
pub async fn execute_crawl(options: CrawlOptions) -> Result<CrawlOutcome> {
    let CrawlOptions {
        seeds,
        resume,
        robots_mapping_file,
        checkpoint_file,
        relevant_urls_file,
        show_progress_bars,
        error_backoff,
        shutdown,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Fetching robots.txt...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let mut crawler = Crawler::new()?.with_checkpoint_path(checkpoint_file.clone());
    if let Some(backoff) = error_backoff {
        crawler = crawler.with_error_backoff(backoff);
    }
    if let Some(flag) = shutdown {
        crawler = crawler.with_shutdown_flag(flag);
    }
    if let Some(ref pb) = progress_bar {
        crawler = crawler.with_progress_callback(spinner_callback(pb.clone()));
    }

    let robots = crawler.fetch_robots(&seeds).await;
    save_robots_mapping(&robots_mapping_file, &robots)?;
    info!("Saved robots.txt for {} sites to {}", robots.len(), robots_mapping_file.display());

    let mut checkpoint = match resume {
        true => CrawlCheckpoint::load(&checkpoint_file)?,
        false => None,
    }
    .unwrap_or_else(|| CrawlCheckpoint::fresh(&seeds));

    let summaries = crawler.crawl(&seeds, &robots, &mut checkpoint).await?;
    let relevant_urls = checkpoint.relevant_for(&seeds);
    write_relevant_urls(&relevant_urls_file, &relevant_urls)?;

    if let Some(ref pb) = progress_bar {
        let pages: usize = summaries.iter().map(|s| s.pages.len()).sum();
        pb.finish_with_message(format!(
            "Crawl complete! {} pages processed, {} relevant URLs",
            pages,
            relevant_urls.len()
        ));
    }

    Ok(CrawlOutcome {
        summaries,
        relevant_urls,
    })
}

/// Generate a crawl report from per-seed summaries
pub fn generate_crawl_report(summaries: &[CrawlSummary]) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    let pages: usize = summaries.iter().map(|s| s.pages.len()).sum();
    report.push_str(&format!("  Pages fetched this run: {}\n", pages));
    let visited: usize = summaries.iter().map(|s| s.visited).sum();
    report.push_str(&format!("  Total visited: {}\n", visited));
    let relevant: usize = summaries.iter().map(|s| s.relevant).sum();
    report.push_str(&format!("  Relevant pages: {}\n", relevant));
    let failed = summaries
        .iter()
        .flat_map(|s| s.pages.iter())
        .filter(|p| p.error.is_some())
        .count();
    report.push_str(&format!("  Failed fetches: {}\n", failed));
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for summary in summaries {
        report.push_str(&format!("## {}\n", summary.seed));
        let status = match summary.status {
            CrawlStatus::Completed => "completed",
            CrawlStatus::Interrupted => "interrupted",
        };
        report.push_str(&format!(
            "  {} ({} visited, {} relevant, {} still queued)\n\n",
            status, summary.visited, summary.relevant, summary.remaining
        ));

        for page in summary.pages.iter().filter(|p| p.relevant) {
            let score = page.score.unwrap_or_default();
            report.push_str(&format!("  {:>4} {}\n", score, extract_url_path(&page.url)));
        }
        report.push('\n');
    }

    report
}
