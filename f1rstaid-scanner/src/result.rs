use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of processing one frontier URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub status_code: u16,
    pub response_time: Duration,
    pub score: Option<i64>,
    pub relevant: bool,
    pub links_queued: usize,
    pub error: Option<String>,
}

impl PageResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            status_code: 0,
            response_time: Duration::from_secs(0),
            score: None,
            relevant: false,
            links_queued: 0,
            error: None,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url)
        }
    }
}

/// How a seed's crawl loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlStatus {
    /// The frontier emptied.
    Completed,
    /// A shutdown was requested; state was flushed before stopping.
    Interrupted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub seed: String,
    pub status: CrawlStatus,
    pub pages: Vec<PageResult>,
    pub visited: usize,
    pub relevant: usize,
    pub remaining: usize,
}
