//! Question answering: canned help, relevance gate, retrieval and
//! map-reduce synthesis.

use crate::document::Document;
use crate::error::Result;
use crate::providers::{ChatModel, CompletionRequest};
use crate::store::KnowledgeIndex;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

pub const DEFAULT_SEARCH_K: usize = 5;
pub const RELEVANCE_MAX_TOKENS: usize = 1000;

pub const EMPTY_QUESTION_MESSAGE: &str = "Please enter a question about F-1 visas, OPT, or CPT.";
pub const PROCESSING_ERROR_MESSAGE: &str = "Error processing request. Please try again.";
pub const RELEVANCE_ERROR_MESSAGE: &str = "Error analyzing question. Please try again.";
pub const CANCELLED_MESSAGE: &str = "Request cancelled.";
pub const UNPARSED_SECTION: &str = "Unable to parse response.";

pub struct HelpTopic {
    pub name: &'static str,
    pub triggers: &'static [&'static str],
    pub response: &'static str,
}

/// Checked in order; the first topic with a matching trigger wins.
pub const HELP_TOPICS: &[HelpTopic] = &[
    HelpTopic {
        name: "help",
        triggers: &[
            "what can you do",
            "how to use",
            "help",
            "expertise",
            "what do i ask you",
            "what's your name",
        ],
        response: "\nHello! I'm F1rstAid, your virtual assistant for F-1 visa questions.\n\
📚 **My Expertise**:\n\n\
I specialize in F-1 visa regulations including:\n\
- OPT/CPT requirements and applications\n\
- STEM OPT extensions (Form I-983)\n\
- Employment authorization documents (Form I-765)\n\
- Maintaining visa status\n\
- Travel restrictions and re-entry requirements\n\n\
Ask me specific questions like:\n\
- 'How long does OPT processing take after submitting Form I-765?'\n\
- 'What are the CPT requirements for summer internships?'",
    },
    HelpTopic {
        name: "question_guidance",
        triggers: &["ask a question", "formulate", "effective questions", "how to ask you"],
        response: "🔍 **How to Ask Effective Questions**:\n\n\
1. Include specific terms: 'OPT', 'CPT', 'I-765', 'I-983'\n\
2. Mention your situation: 'After H1B denial...', 'As a STEM student...'\n\
3. Ask about timelines: 'How long...', 'Processing time for...'\n\
4. Request form guidance: 'Section 5 of I-983...'\n\n\
Example: 'What documents do I need for STEM OPT extension?'",
    },
];

const RELEVANCE_PROMPT: &str = "Analyze if this question relates to F-1 visas, OPT, CPT, or related topics.\n\
Respond EXACTLY in this format:\n\
Relevance: [yes/no]\n\
Reason: [1-2 sentence explanation]\n\
Guidance: [Specific improvement suggestions if irrelevant]\n\n\
Question: {question}";

const MAP_PROMPT: &str = "Use the following portion of a long document to see if any of the text is relevant to answer the question. \n\
Return any relevant text verbatim.\n\
{context}\n\
Question: {question}\n\
Relevant text, if any:";

const REDUCE_PROMPT: &str = "Given the following extracted parts of a long document and a question, create a final answer. \n\
If you don't know the answer, just say that you don't know. Don't try to make up an answer.\n\n\
QUESTION: {question}\n\
=========\n\
{summaries}\n\
=========\n\
FINAL ANSWER:";

pub fn match_help_topic(question: &str) -> Option<&'static HelpTopic> {
    let lowered = question.trim().to_lowercase();
    HELP_TOPICS
        .iter()
        .find(|topic| topic.triggers.iter().any(|trigger| lowered.contains(trigger)))
}

/// Text after `header` up to the end of that line.
pub fn parse_section(response: &str, header: &str) -> String {
    match response.split_once(header) {
        Some((_, rest)) => rest.split('\n').next().unwrap_or_default().trim().to_string(),
        None => UNPARSED_SECTION.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceVerdict {
    pub relevant: bool,
    pub explanation: String,
}

pub fn parse_relevance(response: &str) -> RelevanceVerdict {
    RelevanceVerdict {
        relevant: response.to_lowercase().contains("relevance: yes"),
        explanation: format!(
            "{} {}",
            parse_section(response, "Reason:"),
            parse_section(response, "Guidance:")
        ),
    }
}

pub fn off_topic_message(explanation: &str) -> String {
    format!(
        "\n🚦 **Relevance Check**\n\n{}\n\n💡 **Ask About**:\n\
- OPT/CPT eligibility\n\
- Form I-765 processing\n\
- Maintaining F-1 status\n\
- STEM OPT requirements\n\
- Travel signatures",
        explanation
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub result: String,
    pub sources: Vec<Document>,
}

impl Answer {
    pub fn message(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            sources: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}

#[async_trait]
impl Retriever for KnowledgeIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.similarity_search(query, k).await
    }
}

pub struct Assistant {
    chat: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
    search_k: usize,
    temperature: f32,
    relevance_temperature: f32,
    cancel: Arc<AtomicBool>,
}

impl Assistant {
    pub fn new(chat: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            chat,
            retriever,
            search_k: DEFAULT_SEARCH_K,
            temperature: 0.7,
            relevance_temperature: 0.3,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_search_k(mut self, k: usize) -> Self {
        self.search_k = k.max(1);
        self
    }

    pub fn with_temperatures(mut self, answer: f32, relevance: f32) -> Self {
        self.temperature = answer;
        self.relevance_temperature = relevance;
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Classify a question as on or off topic. Provider failures count as
    /// off topic with a retry hint.
    pub async fn check_relevance(&self, question: &str) -> RelevanceVerdict {
        let prompt = RELEVANCE_PROMPT.replace("{question}", question);
        let request = CompletionRequest::new(prompt, self.relevance_temperature).with_max_tokens(RELEVANCE_MAX_TOKENS);
        match self.chat.complete(&request).await {
            Ok(response) => {
                debug!("Relevance response: {}", response);
                parse_relevance(&response)
            }
            Err(e) => {
                error!("Relevance check failed: {}", e);
                RelevanceVerdict {
                    relevant: false,
                    explanation: RELEVANCE_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }

    async fn map_reduce(&self, question: &str, documents: &[Document]) -> Result<String> {
        let extracts = join_all(documents.iter().map(|doc| {
            let prompt = MAP_PROMPT
                .replace("{context}", &doc.content)
                .replace("{question}", question);
            async move { self.chat.complete(&CompletionRequest::new(prompt, self.temperature)).await }
        }))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let prompt = REDUCE_PROMPT
            .replace("{question}", question)
            .replace("{summaries}", &extracts.join("\n\n"));
        self.chat.complete(&CompletionRequest::new(prompt, self.temperature)).await
    }

    /// Consume a pending cancellation request, if any.
    fn cancelled(&self, stage: &str) -> bool {
        let requested = self.cancel.swap(false, Ordering::SeqCst);
        if requested {
            warn!("Request cancelled {}", stage);
        }
        requested
    }

    async fn answer_on_topic(&self, question: &str) -> Result<Answer> {
        let verdict = self.check_relevance(question).await;
        if self.cancelled("after relevance check") {
            return Ok(Answer::message(CANCELLED_MESSAGE));
        }
        if !verdict.relevant {
            info!("Question judged off topic");
            return Ok(Answer::message(off_topic_message(&verdict.explanation)));
        }

        let sources = self.retriever.retrieve(question, self.search_k).await?;
        debug!("Retrieved {} chunks", sources.len());
        if self.cancelled("after retrieval") {
            return Ok(Answer::message(CANCELLED_MESSAGE));
        }
        let result = self.map_reduce(question, &sources).await?;
        Ok(Answer { result, sources })
    }

    /// Never fails: every error becomes a plain-language message without
    /// sources.
    pub async fn get_answer(&self, question: &str) -> Answer {
        if self.cancelled("before processing") {
            return Answer::message(CANCELLED_MESSAGE);
        }
        if question.trim().is_empty() {
            return Answer::message(EMPTY_QUESTION_MESSAGE);
        }
        if let Some(topic) = match_help_topic(question) {
            debug!("Matched help topic {}", topic.name);
            return Answer::message(topic.response);
        }
        match self.answer_on_topic(question).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Error processing question: {}", e);
                Answer::message(PROCESSING_ERROR_MESSAGE)
            }
        }
    }
}
