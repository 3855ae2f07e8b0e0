//! Token normalization and set-overlap metrics shared by corpus loading
//! and ranking.

use std::collections::HashSet;

use crate::ocr::quality::strip_diacritics;

/// Normalize text to a token set: lowercase, diacritics folded, punctuation
/// dropped, tokens shorter than two characters discarded.
pub fn tokenize(text: &str) -> HashSet<String> {
    let folded = strip_diacritics(&text.to_lowercase());
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_string())
        .collect()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// `|A ∩ B| / min(|A|, |B|)`. More forgiving than Jaccard when one side is
/// much shorter, which is the usual shape of title-vs-document comparisons.
pub fn overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / a.len().min(b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tokenize_folds_and_filters() {
        let tokens = tokenize("Quyết định số 15/QĐ-UBND, ngày 03");
        assert!(tokens.contains("quyet"));
        assert!(tokens.contains("dinh"));
        assert!(tokens.contains("ubnd"));
        assert!(tokens.contains("15"));
        // Single-char fragments are dropped
        assert!(!tokens.iter().any(|t| t.chars().count() < 2));
    }

    #[test]
    fn test_jaccard() {
        let a = set(&["quyet", "dinh", "nhan", "su"]);
        let b = set(&["quyet", "dinh", "khen", "thuong"]);
        assert!((jaccard(&a, &b) - 2.0 / 6.0).abs() < 1e-9);
        assert_eq!(jaccard(&a, &set(&[])), 0.0);
        assert!((jaccard(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_ratio_uses_smaller_set() {
        let short = set(&["quyet", "dinh"]);
        let long = set(&["quyet", "dinh", "ve", "viec", "dieu", "dong"]);
        assert!((overlap_ratio(&short, &long) - 1.0).abs() < 1e-9);
    }
}
