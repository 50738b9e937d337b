//! Full knowledge-base builds and incremental forum updates.

use crate::config::Settings;
use crate::document::Document;
use crate::error::{CoreError, Result};
use crate::forum::ForumClient;
use crate::loaders::load_sources;
use crate::processor::{ContentProcessor, ProcessingMetrics};
use crate::providers::Embedder;
use crate::store::KnowledgeIndex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which subreddits to search and with what terms.
pub struct ForumQuery<'a> {
    pub client: &'a mut ForumClient,
    pub subreddits: &'a [String],
    pub terms: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub generation: Option<String>,
    pub metrics: ProcessingMetrics,
}

/// Load every source, validate and chunk it, and build a new index
/// generation in `settings.index_dir`. Fails with
/// [`CoreError::EmptyCorpus`] when nothing survives validation.
pub async fn build_knowledge_base(
    settings: &Settings,
    websites: &[String],
    forum: Option<ForumQuery<'_>>,
    embedder: Arc<dyn Embedder>,
) -> Result<IngestReport> {
    let mut processor = ContentProcessor::new();
    let forum = forum.map(|query| (query.client, query.subreddits, query.terms));
    let loaded = load_sources(settings, websites, forum, &mut processor.metrics).await?;
    let documents = loaded.len();

    let chunks = processor.process(loaded.into_documents());
    processor.metrics.log_summary();
    if chunks.is_empty() {
        error!("No valid documents found");
        return Err(CoreError::EmptyCorpus);
    }

    info!("Building knowledge index from {} chunks", chunks.len());
    let index = KnowledgeIndex::build(&settings.index_dir, &chunks, embedder).await?;
    Ok(IngestReport {
        documents,
        chunks: chunks.len(),
        generation: index.generation()?,
        metrics: processor.metrics,
    })
}

/// Validated, canonicalized chunks for freshly scraped forum documents.
pub fn prepare_update(processor: &mut ContentProcessor, documents: Vec<Document>) -> Vec<Document> {
    processor.metrics.total_reddit += documents.len();
    processor.process(documents)
}

/// Scrape the forum again and append what is new to the existing index.
/// Returns `false` when nothing was scraped, nothing was valid, or the
/// append failed.
pub async fn update_knowledge_base(settings: &Settings, forum: ForumQuery<'_>, embedder: Arc<dyn Embedder>) -> bool {
    let scraped = forum.client.scrape(forum.subreddits, forum.terms).await;
    if scraped.is_empty() {
        warn!("No new Reddit content found");
        return false;
    }

    let mut processor = ContentProcessor::new();
    let chunks = prepare_update(&mut processor, scraped);
    if chunks.is_empty() {
        warn!("No valid documents found in new content");
        return false;
    }

    if KnowledgeIndex::append(&settings.index_dir, &chunks, embedder).await {
        info!("Added {} new chunks to knowledge base", chunks.len());
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Metadata, SourceType};

    #[test]
    fn test_prepare_update_drops_short_posts() {
        let mut processor = ContentProcessor::new();
        let long = Document::new(
            format!("Title: OPT timing\n\nContent: {}\n\nScore: 12", "My F student OPT card arrived. ".repeat(5)),
            Metadata::new("https://reddit.com/r/f1visa/comments/1", SourceType::Reddit),
        );
        let short = Document::new("tiny", Metadata::new("https://reddit.com/r/f1visa/comments/2", SourceType::Reddit));

        let chunks = prepare_update(&mut processor, vec![long, short]);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.content.contains("F student")));
        assert_eq!(processor.metrics.total_reddit, 2);
    }
}
