//! Weighted lexical ranking of a query document against the corpus, with
//! adaptive top-k expansion and near-duplicate suppression.

use std::collections::HashSet;
use tracing::debug;

use crate::models::{RankedCandidate, ReferenceRecord};
use crate::retrieval::tokenize::{jaccard, overlap_ratio, tokenize};

const CONTENT_WEIGHT: f64 = 10.0;
const TITLE_WEIGHT: f64 = 7.0;
const ISSUER_WEIGHT: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct RankingOptions {
    pub top_k: usize,
    /// Absolute ceiling on how far adaptive expansion may grow the set
    pub top_k_max: usize,
    /// Expansion threshold as a fraction of the k-th base score
    pub expand_ratio: f64,
    /// Absolute score floor for expanded candidates
    pub min_score: f64,
    /// Content-token Jaccard at or above which a candidate is suppressed as
    /// a near-duplicate of an already-selected one
    pub dedup_jaccard: f64,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            top_k_max: 15,
            expand_ratio: 0.9,
            min_score: 0.05,
            dedup_jaccard: 0.85,
        }
    }
}

/// Score one record against the query token set. Only non-empty fields
/// contribute; each field adds
/// `weight × (0.6 × Jaccard + 0.4 × overlap_ratio)`.
fn score_record(query: &HashSet<String>, record: &ReferenceRecord) -> f64 {
    let mut score = 0.0;
    for (tokens, weight) in [
        (&record.content_tokens, CONTENT_WEIGHT),
        (&record.title_tokens, TITLE_WEIGHT),
        (&record.issuer_tokens, ISSUER_WEIGHT),
    ] {
        if tokens.is_empty() {
            continue;
        }
        score += weight * (0.6 * jaccard(query, tokens) + 0.4 * overlap_ratio(query, tokens));
    }
    score
}

/// Rank corpus records against a raw query text.
///
/// The base set is the top-k by score; scanning then continues up to
/// `top_k_max` selections, admitting candidates whose score clears
/// `max(min_score, kth_score × expand_ratio)`. A candidate whose content
/// tokens are near-identical to an already-selected one is skipped in
/// either phase. Selection order is deterministic: score descending, corpus
/// order breaking ties.
pub fn rank<'a>(
    records: &'a [ReferenceRecord],
    query_text: &str,
    opts: &RankingOptions,
) -> Vec<RankedCandidate<'a>> {
    let query = tokenize(query_text);
    if query.is_empty() || records.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            let score = score_record(&query, record);
            (score > 0.0).then_some((idx, score))
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut selected: Vec<(usize, f64)> = Vec::new();
    let mut expansion_threshold: Option<f64> = None;

    for &(idx, score) in &scored {
        if selected.len() >= opts.top_k_max {
            break;
        }
        if let Some(threshold) = expansion_threshold {
            if score < threshold {
                break;
            }
        }

        let duplicate = selected.iter().any(|&(kept, _)| {
            jaccard(&records[idx].content_tokens, &records[kept].content_tokens)
                >= opts.dedup_jaccard
        });
        if duplicate {
            debug!("Skipping near-duplicate corpus record {}", idx);
            continue;
        }

        selected.push((idx, score));
        if selected.len() == opts.top_k && expansion_threshold.is_none() {
            expansion_threshold = Some(opts.min_score.max(score * opts.expand_ratio));
        }
    }

    selected
        .into_iter()
        .enumerate()
        .map(|(position, (idx, score))| RankedCandidate {
            record: &records[idx],
            score,
            rank: position + 1,
        })
        .collect()
}

/// Format selected candidates as the plain-text context block handed to the
/// prompt composer.
pub fn format_block(candidates: &[RankedCandidate], snippet_chars: usize) -> String {
    if candidates.is_empty() {
        return String::new();
    }
    let mut block = String::from("Tài liệu tham khảo tương tự:\n");
    for candidate in candidates {
        let record = candidate.record;
        block.push_str(&format!(
            "\n[{}] {} — {}\n",
            candidate.rank, record.title, record.issuer
        ));
        block.push_str(&format!(
            "Trích: {}\n",
            truncate_at_boundary(&record.content, snippet_chars)
        ));
        block.push_str(&format!("Hành động: {}\n", record.labels.join("; ")));
    }
    block
}

/// Cut text at a char budget, preferring the nearest preceding whitespace
/// so words are not split mid-way.
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    let mut cut = max_chars;
    // Look back a reasonable distance for a whitespace boundary
    let floor = max_chars.saturating_sub(30);
    for i in (floor..max_chars).rev() {
        if chars[i].is_whitespace() {
            cut = i;
            break;
        }
    }
    let mut out: String = chars[..cut].iter().collect();
    out.push('…');
    out
}
