#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    load_urls_from_file, merge_sources, parse_url_line, render_answer, render_validation_report,
    settings_from_args,
};

pub use f1rstaid_core::crawl::{CrawlOptions, execute_crawl, extract_url_path, generate_crawl_report};
