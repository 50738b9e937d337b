//! Core library for F1rstAid: source loading and normalization, the
//! persistent knowledge index, and the question-answering assistant.

pub mod assistant;
pub mod config;
pub mod crawl;
pub mod document;
pub mod error;
pub mod format;
pub mod forum;
pub mod ingest;
pub mod loaders;
pub mod processor;
pub mod providers;
pub mod sources;
pub mod splitter;
pub mod store;
pub mod validator;

pub use assistant::{Answer, Assistant, Retriever};
pub use config::{Secrets, Settings};
pub use document::{Document, Metadata, SourceType};
pub use error::{CoreError, Result};
pub use processor::{ContentProcessor, ProcessingMetrics};
pub use providers::{ChatModel, CompletionRequest, Embedder};
pub use store::KnowledgeIndex;
