//! Text-quality scoring used to judge OCR output acceptability.
//!
//! Vietnamese administrative documents carry a high density of diacritics;
//! recognized text with almost none of them but plenty of plausible ASCII
//! words is the classic signature of a garbled scan.

use crate::models::QualityMetrics;

/// Minimum length before the garble heuristic is trusted at all.
const GARBLE_MIN_CHARS: usize = 80;
const GARBLE_MAX_DIACRITIC_RATIO: f64 = 0.01;
const GARBLE_MIN_ASCII_WORD_RATIO: f64 = 0.9;

const VIETNAMESE_VOWELS: &str = "àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđ\
ÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴÈÉẸẺẼÊỀẾỆỂỄÌÍỊỈĨÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠÙÚỤỦŨƯỪỨỰỬỮỲÝỴỶỸĐ";

/// Fraction of alphabetic characters carrying a Vietnamese diacritic.
pub fn diacritic_ratio(text: &str) -> f64 {
    let mut alphabetic = 0usize;
    let mut marked = 0usize;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            alphabetic += 1;
            if VIETNAMESE_VOWELS.contains(ch) {
                marked += 1;
            }
        }
    }
    if alphabetic == 0 {
        0.0
    } else {
        marked as f64 / alphabetic as f64
    }
}

/// Fraction of whitespace-delimited tokens that are pure ASCII.
pub fn ascii_word_ratio(text: &str) -> f64 {
    let mut words = 0usize;
    let mut ascii_words = 0usize;
    for word in text.split_whitespace() {
        words += 1;
        if word.is_ascii() {
            ascii_words += 1;
        }
    }
    if words == 0 {
        0.0
    } else {
        ascii_words as f64 / words as f64
    }
}

pub fn metrics(text: &str) -> QualityMetrics {
    QualityMetrics {
        diacritic_ratio: diacritic_ratio(text),
        ascii_word_ratio: ascii_word_ratio(text),
    }
}

/// Long text with near-zero diacritics and an overwhelmingly ASCII word
/// stream: treat as a garbled recognition worth a re-attempt.
pub fn looks_garbled(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < GARBLE_MIN_CHARS {
        return false;
    }
    diacritic_ratio(trimmed) < GARBLE_MAX_DIACRITIC_RATIO
        && ascii_word_ratio(trimmed) > GARBLE_MIN_ASCII_WORD_RATIO
}

/// Composite heuristic for choosing between competing OCR candidates of the
/// same page. Higher is better; rewards diacritic presence and text volume.
pub fn quality_score(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let diacritics = (diacritic_ratio(trimmed) * 5.0).min(1.0);
    let non_ascii_words = 1.0 - ascii_word_ratio(trimmed);
    let volume = (trimmed.chars().count() as f64 / 400.0).min(1.0);
    0.5 * diacritics + 0.2 * non_ascii_words + 0.3 * volume
}

/// Fold Vietnamese diacritics to their base ASCII letters (đ -> d).
pub fn strip_diacritics(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

fn fold_char(ch: char) -> char {
    match ch {
        'à' | 'á' | 'ạ' | 'ả' | 'ã' | 'â' | 'ầ' | 'ấ' | 'ậ' | 'ẩ' | 'ẫ' | 'ă' | 'ằ' | 'ắ'
        | 'ặ' | 'ẳ' | 'ẵ' => 'a',
        'è' | 'é' | 'ẹ' | 'ẻ' | 'ẽ' | 'ê' | 'ề' | 'ế' | 'ệ' | 'ể' | 'ễ' => 'e',
        'ì' | 'í' | 'ị' | 'ỉ' | 'ĩ' => 'i',
        'ò' | 'ó' | 'ọ' | 'ỏ' | 'õ' | 'ô' | 'ồ' | 'ố' | 'ộ' | 'ổ' | 'ỗ' | 'ơ' | 'ờ' | 'ớ'
        | 'ợ' | 'ở' | 'ỡ' => 'o',
        'ù' | 'ú' | 'ụ' | 'ủ' | 'ũ' | 'ư' | 'ừ' | 'ứ' | 'ự' | 'ử' | 'ữ' => 'u',
        'ỳ' | 'ý' | 'ỵ' | 'ỷ' | 'ỹ' => 'y',
        'đ' => 'd',
        'À' | 'Á' | 'Ạ' | 'Ả' | 'Ã' | 'Â' | 'Ầ' | 'Ấ' | 'Ậ' | 'Ẩ' | 'Ẫ' | 'Ă' | 'Ằ' | 'Ắ'
        | 'Ặ' | 'Ẳ' | 'Ẵ' => 'A',
        'È' | 'É' | 'Ẹ' | 'Ẻ' | 'Ẽ' | 'Ê' | 'Ề' | 'Ế' | 'Ệ' | 'Ể' | 'Ễ' => 'E',
        'Ì' | 'Í' | 'Ị' | 'Ỉ' | 'Ĩ' => 'I',
        'Ò' | 'Ó' | 'Ọ' | 'Ỏ' | 'Õ' | 'Ô' | 'Ồ' | 'Ố' | 'Ộ' | 'Ổ' | 'Ỗ' | 'Ơ' | 'Ờ' | 'Ớ'
        | 'Ợ' | 'Ở' | 'Ỡ' => 'O',
        'Ù' | 'Ú' | 'Ụ' | 'Ủ' | 'Ũ' | 'Ư' | 'Ừ' | 'Ứ' | 'Ự' | 'Ử' | 'Ữ' => 'U',
        'Ỳ' | 'Ý' | 'Ỵ' | 'Ỷ' | 'Ỹ' => 'Y',
        'Đ' => 'D',
        other => other,
    }
}

/// Space-optimized Levenshtein distance using two rows.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let chars_a: Vec<char> = a.chars().collect();
    let chars_b: Vec<char> = b.chars().collect();

    if chars_a.is_empty() {
        return chars_b.len();
    }
    if chars_b.is_empty() {
        return chars_a.len();
    }

    let mut prev_row: Vec<usize> = (0..=chars_b.len()).collect();
    let mut curr_row = vec![0usize; chars_b.len() + 1];

    for (i, &ca) in chars_a.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, &cb) in chars_b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[chars_b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diacritic_ratio_on_vietnamese_text() {
        let text = "Quyết định về việc bổ nhiệm cán bộ";
        assert!(diacritic_ratio(text) > 0.2);
        assert!(diacritic_ratio("plain ascii text") < f64::EPSILON);
        assert_eq!(diacritic_ratio(""), 0.0);
    }

    #[test]
    fn test_ascii_word_ratio() {
        assert!((ascii_word_ratio("one two three") - 1.0).abs() < f64::EPSILON);
        let mixed = "quyết định one two";
        let ratio = ascii_word_ratio(mixed);
        assert!(ratio > 0.4 && ratio < 0.6);
    }

    #[test]
    fn test_garble_detection() {
        // Long pure-ASCII output from a Vietnamese scan: garbled
        let garbled = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do \
                       eiusmod tempor incididunt ut labore et dolore magna aliqua";
        assert!(looks_garbled(garbled));

        // Short text never triggers
        assert!(!looks_garbled("short ascii"));

        // Healthy Vietnamese text never triggers
        let healthy = "Căn cứ Nghị định số 123 của Chính phủ quy định chức năng, nhiệm vụ, \
                       quyền hạn và cơ cấu tổ chức của Bộ Nội vụ ban hành kèm theo quyết định";
        assert!(!looks_garbled(healthy));
    }

    #[test]
    fn test_quality_score_prefers_diacritics() {
        let vietnamese = "Quyết định về việc điều động và bổ nhiệm cán bộ công chức \
                          thuộc thẩm quyền quản lý của Ủy ban nhân dân thành phố";
        let garbled = "Quyel dinh ve viec dieu dong va bo nhiem can bo cong chuc \
                       thuoc tham quyen quan ly cua Uy ban nhan dan thanh pho";
        assert!(quality_score(vietnamese) > quality_score(garbled));
        assert_eq!(quality_score(""), 0.0);
    }

    #[test]
    fn test_strip_diacritics() {
        assert_eq!(strip_diacritics("Nơi nhận"), "Noi nhan");
        assert_eq!(strip_diacritics("quyết định"), "quyet dinh");
        assert_eq!(strip_diacritics("Đà Nẵng"), "Da Nang");
        assert_eq!(strip_diacritics("unchanged"), "unchanged");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("hello", "hallo"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("noi nhan", "noi nhqn"), 1);
    }
}
