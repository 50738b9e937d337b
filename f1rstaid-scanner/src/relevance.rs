//! Weighted keyword scoring used to decide whether a crawled page is about
//! practical training (CPT/OPT) rather than generic university content.

use tracing::debug;

pub const RELEVANCE_THRESHOLD: i64 = 20;

pub const POSITIVE_KEYWORDS: &[(&str, i64)] = &[
    ("cpt", 5),
    ("opt", 5),
    ("curricular practical training", 4),
    ("optional practical training", 4),
    ("work authorization", 3),
    ("employment authorization", 3),
    ("internship", 2),
    ("practical training", 3),
];

pub const NEGATIVE_KEYWORDS: &[(&str, i64)] = &[
    ("international student", 2),
    ("immigration", 2),
    ("global affairs", 2),
    ("study abroad", 2),
    ("university homepage", 2),
    ("contact us", 2),
];

/// Keyword tables and threshold. Counting is case-insensitive,
/// non-overlapping substring matching, so "opt" also fires inside longer
/// words; the heuristic is kept as-is.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    positive: Vec<(String, i64)>,
    negative: Vec<(String, i64)>,
    threshold: i64,
}

impl RelevanceScorer {
    pub fn new() -> Self {
        Self::with_tables(POSITIVE_KEYWORDS, NEGATIVE_KEYWORDS, RELEVANCE_THRESHOLD)
    }

    pub fn with_tables(positive: &[(&str, i64)], negative: &[(&str, i64)], threshold: i64) -> Self {
        let lower = |table: &[(&str, i64)]| {
            table
                .iter()
                .map(|(keyword, weight)| (keyword.to_lowercase(), *weight))
                .collect()
        };
        Self {
            positive: lower(positive),
            negative: lower(negative),
            threshold,
        }
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn score(&self, content: &str) -> i64 {
        let text = content.to_lowercase();
        let weigh = |table: &[(String, i64)]| -> i64 {
            table
                .iter()
                .map(|(keyword, weight)| weight * text.matches(keyword.as_str()).count() as i64)
                .sum()
        };
        let score = weigh(&self.positive) - weigh(&self.negative);
        debug!("Relevance score: {}", score);
        score
    }

    /// Scores at exactly the threshold count as relevant.
    pub fn is_relevant(&self, content: &str) -> bool {
        self.score(content) >= self.threshold
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new()
    }
}
