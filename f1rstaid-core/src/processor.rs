use crate::document::{Document, SourceType};
use crate::splitter::RecursiveSplitter;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, info};

pub const MIN_CONTENT_CHARS: usize = 50;
pub const PREPROCESS_CACHE_SIZE: usize = 100;

/// Applied in order. Each target contains no source pattern, so running the
/// table twice changes nothing.
pub const TERMINOLOGY: &[(&str, &str)] = &[
    ("F student", "F-1 student"),
    ("F Students", "F-1 Students"),
    ("F visa", "F-1 visa"),
    ("OPT ", "Optional Practical Training (OPT) "),
];

pub const WEB_BOILERPLATE_MARKERS: &[&str] = &["[advertisement]", "cookie", "privacy policy"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    pub total_pdfs: usize,
    pub valid_pdfs: usize,
    pub invalid_pdfs: usize,
    pub total_chunks: usize,
    pub valid_chunks: usize,
    pub invalid_chunks: usize,
    pub total_websites: usize,
    pub valid_websites: usize,
    pub total_reddit: usize,
}

impl ProcessingMetrics {
    pub fn log_summary(&self) {
        info!(
            "Metrics: PDFs={} (valid {}, invalid {}), Websites={} (valid {}), Reddit={}, Chunks={} (valid {}, invalid {})",
            self.total_pdfs,
            self.valid_pdfs,
            self.invalid_pdfs,
            self.total_websites,
            self.valid_websites,
            self.total_reddit,
            self.total_chunks,
            self.valid_chunks,
            self.invalid_chunks
        );
    }
}

pub fn canonicalize_terminology(text: &str) -> String {
    TERMINOLOGY
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Reject empty, short, or non-alphabetic content; web pages are also
/// rejected when they look like cookie banners or ads.
pub fn validate_content(document: &Document) -> bool {
    let content = document.content.trim();
    if content.is_empty() || content.chars().count() < MIN_CONTENT_CHARS || !content.chars().any(char::is_alphabetic) {
        return false;
    }
    if document.source_type() == SourceType::Web {
        let lowered = content.to_lowercase();
        if WEB_BOILERPLATE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return false;
        }
    }
    true
}

#[derive(Debug, Default)]
struct PreprocessCache {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl PreprocessCache {
    fn get(&self, text: &str) -> Option<String> {
        self.entries.get(text).cloned()
    }

    fn insert(&mut self, text: String, processed: String) {
        if self.entries.contains_key(&text) {
            return;
        }
        if self.order.len() >= PREPROCESS_CACHE_SIZE
            && let Some(oldest) = self.order.pop_front()
        {
            self.entries.remove(&oldest);
        }
        self.order.push_back(text.clone());
        self.entries.insert(text, processed);
    }
}

/// Normalizes, validates and chunks raw documents while keeping counts.
pub struct ContentProcessor {
    pub metrics: ProcessingMetrics,
    splitter: RecursiveSplitter,
    cache: Mutex<PreprocessCache>,
}

impl Default for ContentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentProcessor {
    pub fn new() -> Self {
        Self::with_splitter(RecursiveSplitter::default())
    }

    pub fn with_splitter(splitter: RecursiveSplitter) -> Self {
        Self {
            metrics: ProcessingMetrics::default(),
            splitter,
            cache: Mutex::new(PreprocessCache::default()),
        }
    }

    pub fn preprocess_text(&self, text: &str) -> String {
        if let Ok(cache) = self.cache.lock()
            && let Some(hit) = cache.get(text)
        {
            return hit;
        }
        let processed = canonicalize_terminology(text);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(text.to_string(), processed.clone());
        }
        processed
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|cache| cache.entries.len()).unwrap_or(0)
    }

    pub fn validate(&self, document: &Document) -> bool {
        validate_content(document)
    }

    pub fn chunk(&self, document: &Document) -> Vec<Document> {
        self.splitter.split_document(document)
    }

    /// Validate, canonicalize and chunk `documents`. Invalid documents are
    /// dropped and counted.
    pub fn process(&mut self, documents: Vec<Document>) -> Vec<Document> {
        let mut chunks = Vec::new();
        for document in documents {
            let valid = self.validate(&document);
            match (document.source_type(), valid) {
                (SourceType::Pdf, true) => self.metrics.valid_pdfs += 1,
                (SourceType::Pdf, false) => self.metrics.invalid_pdfs += 1,
                (SourceType::Web, true) => self.metrics.valid_websites += 1,
                _ => {}
            }
            if !valid {
                debug!("Dropping invalid document from {}", document.metadata.source);
                continue;
            }

            let canonical = document.derive(self.preprocess_text(&document.content));
            for chunk in self.chunk(&canonical) {
                self.metrics.total_chunks += 1;
                if chunk.content.chars().any(char::is_alphabetic) {
                    self.metrics.valid_chunks += 1;
                    chunks.push(chunk);
                } else {
                    self.metrics.invalid_chunks += 1;
                }
            }
        }
        chunks
    }
}
