use crate::config::Settings;
use crate::document::{Document, Metadata, SourceType};
use crate::error::{CoreError, Result};
use crate::forum::ForumClient;
use crate::processor::ProcessingMetrics;
use f1rstaid_scanner::content::{resolve_url, strip_elements};
use f1rstaid_scanner::fetch::build_client;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{ElementRef, Html, Node};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const WEBSITE_TIMEOUT: Duration = Duration::from_secs(15);
pub const WEBSITE_STRIP_TAGS: &[&str] = &["nav", "footer", "script", "style"];

/// Everything gathered by one ingestion pass, grouped by origin.
#[derive(Debug, Default)]
pub struct LoadedSources {
    pub pdfs: Vec<Document>,
    pub websites: Vec<Document>,
    pub reddit: Vec<Document>,
}

impl LoadedSources {
    pub fn len(&self) -> usize {
        self.pdfs.len() + self.websites.len() + self.reddit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_documents(self) -> Vec<Document> {
        let mut documents = self.pdfs;
        documents.extend(self.websites);
        documents.extend(self.reddit);
        documents
    }
}

/// `*.pdf` files directly inside `dir`, sorted by name.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "pdf"))
        .collect();
    files.sort();
    Ok(files)
}

/// Text of each page of a PDF, in page order.
pub async fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_by_pages(&owned))
        .await?
        .map_err(|e| CoreError::Pdf(e.to_string()))
}

/// One document per non-blank page, tagged with its zero-based page number.
pub fn pages_to_documents(path: &Path, pages: Vec<String>) -> Vec<Document> {
    let filename = path.file_name().map(|name| name.to_string_lossy().into_owned());
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| {
            let mut metadata = Metadata::new(path.display().to_string(), SourceType::Pdf);
            metadata.filename = filename.clone();
            metadata.page = u32::try_from(index).ok();
            Document::new(text, metadata)
        })
        .collect()
}

/// Unreadable files are logged and yield nothing.
pub async fn load_pdf(path: PathBuf) -> Vec<Document> {
    match extract_pdf_pages(&path).await {
        Ok(pages) => {
            debug!("Extracted {} pages from {}", pages.len(), path.display());
            pages_to_documents(&path, pages)
        }
        Err(e) => {
            error!("Error processing PDF {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn collect_text(element: ElementRef<'_>, page_url: &str, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let piece = text.trim();
                if !piece.is_empty() {
                    out.push(piece.to_string());
                }
            }
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let target = (child.value().name() == "a")
                    .then(|| child.value().attr("href"))
                    .flatten()
                    .and_then(|href| resolve_url(page_url, href));
                match target {
                    Some(target) => {
                        let label = child
                            .text()
                            .map(str::trim)
                            .filter(|piece| !piece.is_empty())
                            .collect::<Vec<_>>()
                            .join(" ");
                        if label.is_empty() {
                            out.push(target);
                        } else {
                            out.push(format!("[{}]({})", label, target));
                        }
                    }
                    None => collect_text(child, page_url, out),
                }
            }
            _ => {}
        }
    }
}

/// Text of an HTML page with navigation, footers, scripts and styles
/// removed. Text nodes are kept on separate lines; links keep their
/// absolute target as `[label](url)`.
pub fn html_to_text(html: &str, page_url: &str) -> String {
    let mut document = Html::parse_document(html);
    strip_elements(&mut document, WEBSITE_STRIP_TAGS);
    let mut pieces = Vec::new();
    collect_text(document.root_element(), page_url, &mut pieces);
    pieces.join("\n")
}

pub async fn load_website(client: &Client, url: &str) -> Option<Document> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            error!("Error processing website {}: {}", url, e);
            return None;
        }
    };
    if response.status().as_u16() != 200 {
        warn!("Received status code {} for {}", response.status().as_u16(), url);
        return None;
    }
    match response.text().await {
        Ok(html) => Some(Document::new(html_to_text(&html, url), Metadata::new(url, SourceType::Web))),
        Err(e) => {
            error!("Error reading website {}: {}", url, e);
            None
        }
    }
}

/// Load every PDF in `dir` with at most `concurrency` extractions in flight.
/// Each task returns its own slot; nothing is shared while they run.
pub async fn load_pdfs(dir: &Path, concurrency: usize) -> Result<Vec<Vec<Document>>> {
    let files = list_pdfs(dir)?;
    info!("Loading {} PDFs from {}", files.len(), dir.display());
    Ok(stream::iter(files)
        .map(load_pdf)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await)
}

pub async fn load_websites(client: &Client, urls: &[String], concurrency: usize) -> Vec<Option<Document>> {
    info!("Loading {} websites", urls.len());
    stream::iter(urls)
        .map(|url| load_website(client, url))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

/// Gather PDFs, website pages and (when a client is given) forum posts.
/// Counters are folded into `metrics` after each group is joined.
pub async fn load_sources(
    settings: &Settings,
    websites: &[String],
    forum: Option<(&mut ForumClient, &[String], &[String])>,
    metrics: &mut ProcessingMetrics,
) -> Result<LoadedSources> {
    let mut loaded = LoadedSources::default();

    if settings.docs_dir.is_dir() {
        for docs in load_pdfs(&settings.docs_dir, settings.load_concurrency).await? {
            metrics.total_pdfs += docs.len();
            loaded.pdfs.extend(docs);
        }
    } else {
        warn!("Docs directory {} not found, skipping PDFs", settings.docs_dir.display());
    }

    let client = build_client(WEBSITE_TIMEOUT)?;
    for doc in load_websites(&client, websites, settings.load_concurrency)
        .await
        .into_iter()
        .flatten()
    {
        metrics.total_websites += 1;
        loaded.websites.push(doc);
    }

    match forum {
        Some((client, subreddits, terms)) => {
            loaded.reddit = client.scrape(subreddits, terms).await;
            metrics.total_reddit += loaded.reddit.len();
        }
        None => info!("No Reddit credentials configured, skipping forum content"),
    }

    info!("Loaded {} documents in total", loaded.len());
    Ok(loaded)
}
