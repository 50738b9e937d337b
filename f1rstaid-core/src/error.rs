use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("Index validation failed: {0}")]
    IndexValidation(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl error: {0}")]
    Scan(#[from] f1rstaid_scanner::ScanError),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("No valid documents found")]
    EmptyCorpus,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
