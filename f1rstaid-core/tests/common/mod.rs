#![allow(dead_code)]

use async_trait::async_trait;
use f1rstaid_core::document::{Document, Metadata, SourceType};
use f1rstaid_core::error::{CoreError, Result};
use f1rstaid_core::providers::{ChatModel, CompletionRequest, Embedder};
use f1rstaid_core::Retriever;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const DIMENSIONS: usize = 256;

/// Bag-of-words vectors: each lowercase token bumps one hashed bucket.
pub struct HashEmbedder;

pub fn bucket(token: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMENSIONS as u64) as usize
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSIONS];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        vector[bucket(token)] += 1.0;
    }
    vector
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(inputs.iter().map(|input| embed_text(input)).collect())
    }
}

/// Stores vectors fine but answers queries in a different dimension, so
/// every search comes back empty.
pub struct MismatchedEmbedder;

#[async_trait]
impl Embedder for MismatchedEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(inputs.iter().map(|input| embed_text(input)).collect())
    }

    async fn embed_query(&self, _query: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; 3])
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(CoreError::Provider("embedding service unavailable".to_string()))
    }
}

/// Chat model answering each prompt kind with a fixed reply and recording
/// every prompt it sees.
pub struct ScriptedChat {
    pub relevance_reply: Option<String>,
    pub extract_reply: String,
    pub final_reply: String,
    pub prompts: Mutex<Vec<String>>,
    /// Raised once the relevance call has been answered.
    pub cancel_on_relevance: Option<Arc<AtomicBool>>,
}

impl ScriptedChat {
    pub fn on_topic() -> Self {
        Self::with_relevance(Some("Relevance: yes\nReason: Asks about OPT.\nGuidance: None needed."))
    }

    pub fn off_topic() -> Self {
        Self::with_relevance(Some(
            "Relevance: no\nReason: The question is about cooking.\nGuidance: Ask about F-1 rules.",
        ))
    }

    /// Relevance calls fail with a provider error.
    pub fn failing_relevance() -> Self {
        Self::with_relevance(None)
    }

    fn with_relevance(reply: Option<&str>) -> Self {
        Self {
            relevance_reply: reply.map(str::to_string),
            extract_reply: "Apply up to 90 days before completion.".to_string(),
            final_reply: "You can file Form I-765 up to 90 days before your program ends.".to_string(),
            prompts: Mutex::new(Vec::new()),
            cancel_on_relevance: None,
        }
    }

    pub fn cancelling_after_relevance(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_on_relevance = Some(flag);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts_starting_with(&self, prefix: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if request.prompt.starts_with("Analyze if this question") {
            if let Some(flag) = &self.cancel_on_relevance {
                flag.store(true, Ordering::SeqCst);
            }
            return self
                .relevance_reply
                .clone()
                .ok_or_else(|| CoreError::Provider("rate limited".to_string()));
        }
        if request.prompt.starts_with("Use the following portion") {
            return Ok(self.extract_reply.clone());
        }
        Ok(self.final_reply.clone())
    }
}

pub struct StaticRetriever {
    pub documents: Vec<Document>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StaticRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CoreError::Config("knowledge index not found".to_string()));
        }
        Ok(self.documents.iter().take(k).cloned().collect())
    }
}

pub fn web_doc(source: &str, content: &str) -> Document {
    Document::new(content, Metadata::new(source, SourceType::Web))
}

pub fn reddit_doc(source: &str, content: &str) -> Document {
    Document::new(content, Metadata::new(source, SourceType::Reddit))
}

pub fn sample_corpus() -> Vec<Document> {
    vec![
        web_doc(
            "https://www.uscis.gov/opt",
            "Optional Practical Training (OPT) lets F-1 students work in their field. Apply for OPT with Form I-765 up to 90 days before program completion.",
        ),
        web_doc(
            "https://www.ice.gov/cpt",
            "Curricular Practical Training (CPT) must be an integral part of the curriculum and is authorized by the designated school official on the I-20.",
        ),
        reddit_doc(
            "https://reddit.com/r/f1visa/comments/abc",
            "Comment on: Travel during OPT\n\nContent: I travelled with my EAD card and a job offer letter and re-entry was fine.\n\nScore: 14",
        ),
    ]
}
