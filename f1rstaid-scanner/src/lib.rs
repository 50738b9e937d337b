//! Crawling support for F1rstAid: robots.txt handling, keyword relevance
//! scoring, and a resumable breadth-first crawler.

pub mod content;
pub mod crawler;
pub mod error;
pub mod fetch;
pub mod relevance;
pub mod result;
pub mod robots;
pub mod state;

pub use crawler::Crawler;
pub use error::ScanError;
pub use relevance::RelevanceScorer;
pub use result::{CrawlStatus, CrawlSummary, PageResult};
pub use robots::{RobotsMapping, RobotsPolicy};
pub use state::{CrawlCheckpoint, DomainState};
