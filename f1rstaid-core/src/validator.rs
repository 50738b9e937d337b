//! Offline quality check of a persisted knowledge index.

use crate::assistant::Retriever;
use crate::document::Document;
use crate::error::Result;
use crate::providers::Embedder;
use crate::store::KnowledgeIndex;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

pub const VALIDATION_K: usize = 2;
pub const MIN_RESULT_CHARS: usize = 50;

/// Pre-canonical spellings that must not survive preprocessing.
pub const TERMINOLOGY_CHECKS: &[(&str, &str)] = &[
    ("F student", "F-1 student"),
    ("F Students", "F-1 Students"),
    ("F visa", "F-1 visa"),
];

pub const VALIDATION_QUERIES: &[&str] = &[
    "If my OPT is pending, can I travel internationally without risk of denial upon re-entry?",
    "How many unemployment days can I accrue during the initial 12-month OPT period and the STEM extension?",
    "Is unpaid volunteer work considered valid employment for OPT status maintenance?",
    "Can I apply for STEM OPT extension after completing CPT during my master's program?",
    "If I used CPT for more than 12 months, does it disqualify me from OPT eligibility?",
    "Does USCIS or SEVP allow multiple CPT employers simultaneously?",
    "Is it legal to start working under CPT authorization before receiving the updated I-20?",
    "Can I work remotely from outside the U.S. during CPT without violating F-1 status?",
    "What are the specific reporting obligations during STEM OPT, and how frequently must I update SEVIS?",
    "If my employer’s E-Verify account expires, how does that impact my STEM OPT status?",
    "Can I change employers while my STEM OPT extension application is pending approval?",
    "What documents are mandatory for re-entry to the U.S. if traveling during approved OPT or STEM OPT?",
    "Can I renew my expired F-1 visa while on OPT if my OPT authorization is active but my course completion date has passed?",
    "Can I use Day 1 CPT during a second master's degree after previously utilizing my entire OPT/STEM OPT period?",
    "If USCIS rejects my OPT application due to a payment error, can I reapply after my program completion date?",
];

/// First structural problem in a result set, if any.
pub fn validate_results(results: &[Document], query: &str) -> std::result::Result<(), String> {
    if results.is_empty() {
        return Err("No results returned".to_string());
    }
    for (i, doc) in results.iter().enumerate() {
        let content = doc.content.trim();
        let length = content.chars().count();
        if length < MIN_RESULT_CHARS {
            return Err(format!("Result too short ({} chars) for query: {}", length, query));
        }
        if results
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && other.content == doc.content)
        {
            return Err(format!("Duplicate results found for query: {}", query));
        }
        if !content.chars().any(char::is_alphabetic) {
            return Err(format!("No meaningful text found in result for query: {}", query));
        }
    }
    Ok(())
}

pub fn validate_terminology(content: &str) -> std::result::Result<(), String> {
    match TERMINOLOGY_CHECKS.iter().find(|(incorrect, _)| content.contains(incorrect)) {
        Some((incorrect, correct)) => Err(format!(
            "Found incorrect terminology: '{}' (should be '{}')",
            incorrect, correct
        )),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    pub source: String,
    pub length: usize,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub query: String,
    pub results: Vec<ResultSummary>,
    pub failure: Option<String>,
}

impl QueryOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub index_path: String,
    pub outcomes: Vec<QueryOutcome>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(QueryOutcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed())
    }
}

fn summarize(doc: &Document) -> ResultSummary {
    let content = doc.content.trim();
    ResultSummary {
        source: doc.metadata.source.clone(),
        length: content.chars().count(),
        preview: content.chars().take(200).collect(),
    }
}

async fn check_query(retriever: &dyn Retriever, query: &str) -> QueryOutcome {
    let results = match retriever.retrieve(query, VALIDATION_K).await {
        Ok(results) => results,
        Err(e) => {
            return QueryOutcome {
                query: query.to_string(),
                results: Vec::new(),
                failure: Some(format!("Search failed for query: {} ({})", query, e)),
            };
        }
    };
    let failure = validate_results(&results, query)
        .and_then(|_| results.iter().try_for_each(|doc| validate_terminology(&doc.content)))
        .err();
    QueryOutcome {
        query: query.to_string(),
        results: results.iter().map(summarize).collect(),
        failure,
    }
}

/// Run `queries` against `retriever`. A failing query is recorded and the
/// run moves on to the next one.
pub async fn run_battery(retriever: &dyn Retriever, queries: &[&str], index_path: &Path) -> ValidationReport {
    let mut outcomes = Vec::with_capacity(queries.len());
    for query in queries {
        let outcome = check_query(retriever, query).await;
        match outcome.failure {
            Some(ref failure) => error!("Validation failed: {}", failure),
            None => info!("Query passed: {}", query),
        }
        outcomes.push(outcome);
    }
    ValidationReport {
        index_path: index_path.display().to_string(),
        outcomes,
    }
}

pub async fn validate_index(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<ValidationReport> {
    let index = KnowledgeIndex::open(dir, embedder)?;
    info!("Validating knowledge index at {}", index.path().display());
    Ok(run_battery(&index, VALIDATION_QUERIES, dir).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Metadata, SourceType};

    fn doc(content: &str, source: &str) -> Document {
        Document::new(content, Metadata::new(source, SourceType::Web))
    }

    #[test]
    fn test_duplicate_content_rejected_despite_metadata() {
        let text = "F-1 students may work on campus up to twenty hours per week during term.";
        let results = vec![doc(text, "https://a.edu"), doc(text, "https://b.edu")];
        assert_eq!(
            validate_results(&results, "q").unwrap_err(),
            "Duplicate results found for query: q"
        );
    }

    #[test]
    fn test_short_and_empty_results() {
        assert_eq!(validate_results(&[], "q").unwrap_err(), "No results returned");
        assert_eq!(
            validate_results(&[doc("  too short  ", "x")], "q").unwrap_err(),
            "Result too short (9 chars) for query: q"
        );
        let digits = "1234567890 ".repeat(6);
        assert_eq!(
            validate_results(&[doc(&digits, "x")], "q").unwrap_err(),
            "No meaningful text found in result for query: q"
        );
    }

    #[test]
    fn test_terminology_flags_first_offender() {
        assert_eq!(
            validate_terminology("An F visa holder").unwrap_err(),
            "Found incorrect terminology: 'F visa' (should be 'F-1 visa')"
        );
        assert!(validate_terminology("An F-1 visa holder and F-1 students").is_ok());
    }

    #[test]
    fn test_battery_has_fifteen_queries() {
        assert_eq!(VALIDATION_QUERIES.len(), 15);
    }
}
