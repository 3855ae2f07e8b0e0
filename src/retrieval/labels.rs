//! Verbatim multi-label parsing and confidence-weighted voting.

use std::collections::HashSet;

use crate::models::{LabelVote, RankedCandidate};

/// Split a raw multi-label string into individual labels.
///
/// Separators are semicolons, newlines, and bullet characters only. Commas
/// and slashes are NOT separators: label text legitimately contains them
/// ("Trình lãnh đạo, chờ phê duyệt" is one label). Pieces are trimmed of
/// outer whitespace; internal content, casing, and punctuation are kept
/// exactly. Exact duplicates are removed, first occurrence wins.
pub fn parse_labels(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut labels = Vec::new();
    for piece in raw.split([';', '\n', '•']) {
        let label = piece.trim();
        if label.is_empty() {
            continue;
        }
        if seen.insert(label.to_string()) {
            labels.push(label.to_string());
        }
    }
    labels
}

/// Aggregate labels across ranked candidates. Each candidate contributes
/// its score normalized by the best candidate score; per-label totals are
/// then normalized so the strongest label scores 1.0. Labels below
/// `min_score` (after normalization) are dropped; an optional allow-list
/// restricts which labels may vote at all.
pub fn vote_labels(
    candidates: &[RankedCandidate],
    allowed: Option<&HashSet<String>>,
    min_score: f64,
) -> Vec<LabelVote> {
    let max_score = candidates
        .iter()
        .map(|c| c.score)
        .fold(0.0f64, f64::max);
    if max_score <= 0.0 {
        return Vec::new();
    }

    let mut order: Vec<String> = Vec::new();
    let mut totals: std::collections::HashMap<String, (f64, Vec<usize>)> =
        std::collections::HashMap::new();

    for candidate in candidates {
        let weight = candidate.score / max_score;
        for label in &candidate.record.labels {
            if let Some(allowed) = allowed {
                if !allowed.contains(label) {
                    continue;
                }
            }
            let entry = totals
                .entry(label.clone())
                .or_insert_with(|| {
                    order.push(label.clone());
                    (0.0, Vec::new())
                });
            entry.0 += weight;
            entry.1.push(candidate.rank);
        }
    }

    let max_total = totals.values().map(|(s, _)| *s).fold(0.0f64, f64::max);
    if max_total <= 0.0 {
        return Vec::new();
    }

    let mut votes: Vec<LabelVote> = order
        .into_iter()
        .filter_map(|label| {
            let (total, voters) = totals.remove(&label)?;
            let score = total / max_total;
            if score < min_score {
                return None;
            }
            Some(LabelVote {
                label,
                score,
                voters,
            })
        })
        .collect();

    // Score descending; insertion order breaks ties deterministically
    votes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    votes
}
