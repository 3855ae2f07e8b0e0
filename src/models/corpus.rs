use std::collections::HashSet;

/// One labeled example from the classification reference corpus.
///
/// Records with empty content, an unparseable label string, or content below
/// the configured minimum length are excluded at load time.
#[derive(Debug, Clone)]
pub struct ReferenceRecord {
    pub doc_type: String,
    pub issuer: String,
    pub title: String,
    pub content: String,
    /// Raw multi-label action string, exactly as loaded
    pub raw_labels: String,
    /// Parsed labels: ordered, deduplicated, casing and punctuation
    /// preserved verbatim
    pub labels: Vec<String>,
    pub content_tokens: HashSet<String>,
    pub title_tokens: HashSet<String>,
    pub issuer_tokens: HashSet<String>,
}

/// Scored pairing of a query against a reference record. Transient; produced
/// per classification request and never persisted.
#[derive(Debug, Clone)]
pub struct RankedCandidate<'a> {
    pub record: &'a ReferenceRecord,
    pub score: f64,
    /// 1-based rank in the returned result set
    pub rank: usize,
}

/// One label's aggregated vote across retrieved neighbors.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVote {
    pub label: String,
    /// Normalized to 1.0 for the strongest label
    pub score: f64,
    /// 1-based candidate ranks that voted for this label
    pub voters: Vec<usize>,
}
