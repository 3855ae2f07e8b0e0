//! Deterministic text cleanup applied after recognition or native-text
//! extraction. No I/O happens here except loading the optional user
//! correction dictionary at construction time.
//!
//! The per-page chain runs banner stripping, character-class cleanup,
//! recipient-block ("Nơi nhận") normalization, NFC + de-hyphenation,
//! continuation-line joining, and user corrections, in that order. Each
//! stage is individually toggleable and the chain is idempotent: running
//! it twice over the same input yields identical output.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::ocr::quality::{levenshtein, strip_diacritics};

/// Stage toggles for the cleanup chain.
#[derive(Debug, Clone)]
pub struct PostProcessOptions {
    pub strip_page_banners: bool,
    pub charset_cleanup: bool,
    pub collapse_recipients: bool,
    /// Cap on list lines folded into the recipient summary
    pub recipients_max_lines: usize,
    pub unicode_nfc: bool,
    pub join_continuations: bool,
    /// Document-wide boilerplate filter (headers/footers/watermarks)
    pub drop_repeated_lines: bool,
    /// Fraction of pages a line must appear on before it is dropped
    pub repeated_line_threshold: f64,
}

impl Default for PostProcessOptions {
    fn default() -> Self {
        Self {
            strip_page_banners: true,
            charset_cleanup: true,
            collapse_recipients: true,
            recipients_max_lines: 8,
            unicode_nfc: true,
            join_continuations: true,
            drop_repeated_lines: false,
            repeated_line_threshold: 0.6,
        }
    }
}

/// Punctuation retained by character-class cleanup. Everything outside
/// alphanumerics, whitespace, and this set becomes a space.
const PUNCT_WHITELIST: &str = ".,:;!?()[]{}\"'%/-–—+*=<>@#&_|•";

/// Canonical spelling of the Vietnamese distribution-list heading.
const RECIPIENT_HEADING: &str = "Nơi nhận";
const RECIPIENT_HEADING_KEY: &str = "noi nhan";
const RECIPIENT_EDIT_DISTANCE: usize = 2;

#[derive(Debug, Deserialize)]
struct PatternEntry {
    pattern: String,
    replacement: String,
}

/// On-disk shape of the user correction dictionary.
#[derive(Debug, Default, Deserialize)]
struct CorrectionsFile {
    #[serde(default)]
    literals: BTreeMap<String, String>,
    #[serde(default)]
    patterns: Vec<PatternEntry>,
}

pub struct PostProcessor {
    opts: PostProcessOptions,
    banner_re: Regex,
    bullet_re: Regex,
    multi_space_re: Regex,
    space_before_punct_re: Regex,
    literal_corrections: Vec<(String, String)>,
    pattern_corrections: Vec<(Regex, String)>,
}

impl PostProcessor {
    pub fn new(opts: PostProcessOptions) -> Result<Self> {
        Ok(Self {
            opts,
            banner_re: Regex::new(r"(?i)^\s*(page|trang)\s+\d+\s*(?:(?:/|of|trên)\s*\d+)?\s*$")?,
            bullet_re: Regex::new(r"^\s*(?:[-–—+•*]|\d{1,2}[.)])\s*")?,
            multi_space_re: Regex::new(r"[ \t]{2,}")?,
            space_before_punct_re: Regex::new(r"[ \t]+([.,;:!?)\]])")?,
            literal_corrections: Vec::new(),
            pattern_corrections: Vec::new(),
        })
    }

    /// Load the optional user correction dictionary. Literal replacements
    /// apply in deterministic (sorted) order, then regex substitutions in
    /// file order.
    pub fn with_corrections(mut self, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading corrections file {}", path.display()))?;
        let file: CorrectionsFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing corrections file {}", path.display()))?;

        self.literal_corrections = file.literals.into_iter().collect();
        for entry in file.patterns {
            let re = Regex::new(&entry.pattern)
                .with_context(|| format!("invalid correction pattern: {}", entry.pattern))?;
            self.pattern_corrections.push((re, entry.replacement));
        }
        info!(
            "Loaded {} literal and {} pattern corrections from {}",
            self.literal_corrections.len(),
            self.pattern_corrections.len(),
            path.display()
        );
        Ok(self)
    }

    /// Run the full per-page chain.
    pub fn process_page(&self, text: &str) -> String {
        let mut lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();

        if self.opts.strip_page_banners {
            lines.retain(|line| !self.banner_re.is_match(line));
        }
        if self.opts.charset_cleanup {
            for line in &mut lines {
                *line = self.cleanup_charset(line);
            }
        }
        self.normalize_recipients(&mut lines);
        if self.opts.unicode_nfc {
            lines = self.nfc_and_dehyphenate(lines);
        }
        for line in &mut lines {
            let trimmed = line.trim_end();
            if trimmed.len() != line.len() {
                *line = trimmed.to_string();
            }
        }
        if self.opts.join_continuations {
            lines = join_continuation_lines(lines);
        }

        let mut out = lines.join("\n").trim().to_string();
        out = self.apply_corrections(out);
        out
    }

    /// Document-wide pass over already-cleaned page texts. Currently only
    /// the repeated-line boilerplate filter.
    pub fn process_document(&self, pages: &mut [String]) {
        if !self.opts.drop_repeated_lines || pages.len() < 3 {
            return;
        }

        let mut page_counts: HashMap<&str, usize> = HashMap::new();
        let mut seen_per_page: Vec<HashSet<&str>> = Vec::with_capacity(pages.len());
        for page in pages.iter() {
            let mut seen = HashSet::new();
            for line in page.lines() {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    seen.insert(trimmed);
                }
            }
            for line in &seen {
                *page_counts.entry(*line).or_insert(0) += 1;
            }
            seen_per_page.push(seen);
        }

        let min_pages =
            ((pages.len() as f64) * self.opts.repeated_line_threshold).ceil() as usize;
        let repeated: HashSet<String> = page_counts
            .into_iter()
            .filter(|(_, count)| *count >= min_pages.max(2))
            .map(|(line, _)| line.to_string())
            .collect();
        if repeated.is_empty() {
            return;
        }
        debug!("Dropping {} repeated boilerplate line(s)", repeated.len());

        for page in pages.iter_mut() {
            let kept: Vec<&str> = page
                .lines()
                .filter(|line| !repeated.contains(line.trim()))
                .collect();
            *page = kept.join("\n").trim().to_string();
        }
    }

    fn cleanup_charset(&self, line: &str) -> String {
        let mapped: String = line
            .chars()
            .map(|ch| {
                if ch.is_alphanumeric() || ch.is_whitespace() || PUNCT_WHITELIST.contains(ch) {
                    ch
                } else {
                    ' '
                }
            })
            .collect();
        let collapsed = self.multi_space_re.replace_all(&mapped, " ");
        self.space_before_punct_re
            .replace_all(&collapsed, "$1")
            .trim_end()
            .to_string()
    }

    /// Stage 3: fuzzy-match the distribution-list heading and either fold
    /// the following list items into one summary line or just fix the
    /// heading's spelling.
    fn normalize_recipients(&self, lines: &mut Vec<String>) {
        let Some(heading_idx) = lines.iter().position(|l| is_recipient_heading(l)) else {
            return;
        };

        if !self.opts.collapse_recipients {
            let respelled = respell_heading(&lines[heading_idx]);
            lines[heading_idx] = respelled;
            return;
        }

        let mut items = Vec::new();
        let mut end = heading_idx + 1;
        while end < lines.len() && items.len() < self.opts.recipients_max_lines {
            let line = &lines[end];
            if !self.bullet_re.is_match(line) {
                break;
            }
            let item = self
                .bullet_re
                .replace(line, "")
                .trim()
                .trim_end_matches([';', ','])
                .trim()
                .to_string();
            if !item.is_empty() {
                items.push(item);
            }
            end += 1;
        }

        // Heading with no list body: leave the page untouched so a second
        // pass over already-collapsed text is a no-op
        if items.is_empty() {
            if is_bare_recipient_heading(&lines[heading_idx]) {
                lines[heading_idx] = format!("{}:", RECIPIENT_HEADING);
            }
            return;
        }

        let summary = format!(". {}: {}", RECIPIENT_HEADING, items.join(", "));
        lines.splice(heading_idx..end, std::iter::once(summary));
    }

    /// Stage 4: NFC normalization plus merging of hyphen-wrapped words.
    fn nfc_and_dehyphenate(&self, lines: Vec<String>) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        for line in lines {
            let line: String = line.nfc().collect();
            if let Some(prev) = out.last_mut() {
                let continues_word = line
                    .chars()
                    .next()
                    .map(|c| c.is_lowercase())
                    .unwrap_or(false);
                if prev.ends_with('-') && continues_word {
                    prev.pop();
                    prev.push_str(line.trim_start());
                    continue;
                }
            }
            out.push(line);
        }
        out
    }

    fn apply_corrections(&self, mut text: String) -> String {
        for (from, to) in &self.literal_corrections {
            if text.contains(from.as_str()) {
                text = text.replace(from.as_str(), to);
            }
        }
        for (re, replacement) in &self.pattern_corrections {
            text = re.replace_all(&text, replacement.as_str()).into_owned();
        }
        text
    }
}

/// Whether a line is the recipient-block heading, tolerating OCR corruption
/// of the diacritics via a small edit-distance window.
fn is_recipient_heading(line: &str) -> bool {
    let Some(core) = heading_core(line) else {
        return false;
    };
    levenshtein(&core, RECIPIENT_HEADING_KEY) <= RECIPIENT_EDIT_DISTANCE
}

/// Correct the heading's spelling in place, keeping whatever follows the
/// colon untouched.
fn respell_heading(line: &str) -> String {
    match line.trim().split_once(':') {
        Some((_, rest)) if !rest.trim().is_empty() => {
            format!("{}:{}", RECIPIENT_HEADING, rest)
        }
        _ => format!("{}:", RECIPIENT_HEADING),
    }
}

/// Heading line with nothing after the colon.
fn is_bare_recipient_heading(line: &str) -> bool {
    let trimmed = line.trim();
    match trimmed.split_once(':') {
        Some((_, rest)) => rest.trim().is_empty(),
        None => true,
    }
}

/// The folded, lowercased heading candidate: text before the first colon,
/// minus leading punctuation. Returns None when the candidate is too long
/// to plausibly be the heading.
fn heading_core(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let before_colon = trimmed.split(':').next().unwrap_or(trimmed);
    let stripped = before_colon.trim_start_matches(|c: char| !c.is_alphanumeric());
    let folded = strip_diacritics(stripped).to_lowercase();
    let folded = folded.trim().to_string();
    if folded.is_empty() || folded.chars().count() > RECIPIENT_HEADING_KEY.len() + 3 {
        return None;
    }
    Some(folded)
}

/// Stage 5: merge lines that begin with a lowercase letter into the
/// preceding line, recovering sentences split across OCR lines.
fn join_continuation_lines(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let first_letter = line
            .trim_start()
            .chars()
            .find(|c| !matches!(c, '(' | '[' | '{' | '"' | '\'' | ',' | '.' | '…'));
        let continues = first_letter.map(|c| c.is_lowercase()).unwrap_or(false);
        match out.last_mut() {
            Some(prev) if continues && !prev.trim().is_empty() => {
                prev.push(' ');
                prev.push_str(line.trim());
            }
            _ => out.push(line),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> PostProcessor {
        PostProcessor::new(PostProcessOptions::default()).unwrap()
    }

    #[test]
    fn test_banner_lines_are_stripped() {
        let p = processor();
        let input = "Trang 1/3\nQuyết định số 42\nPage 2 of 3";
        assert_eq!(p.process_page(input), "Quyết định số 42");
    }

    #[test]
    fn test_charset_cleanup_replaces_junk() {
        let p = processor();
        let cleaned = p.process_page("Điều 1 ™ : thi hành § quyết định");
        assert!(!cleaned.contains('™'));
        assert!(!cleaned.contains('§'));
        assert!(cleaned.contains("Điều 1"));
        // No doubled spaces survive
        assert!(!cleaned.contains("  "));
    }

    #[test]
    fn test_recipient_block_is_collapsed() {
        let p = processor();
        let input = "Điều 2. Quyết định có hiệu lực\nNơi nhận:\n- Như Điều 1;\n- Lưu VT, TCCB;";
        let out = p.process_page(input);
        assert!(out.contains(". Nơi nhận: Như Điều 1, Lưu VT, TCCB"));
        assert!(!out.contains("- Như Điều 1"));
    }

    #[test]
    fn test_corrupted_recipient_heading_matches() {
        // OCR mangled the diacritics; edit distance still catches it
        let p = processor();
        let input = "Noi nhqn:\n- Bộ Nội vụ;\n- Lưu VT;";
        let out = p.process_page(input);
        assert!(out.contains(". Nơi nhận: Bộ Nội vụ, Lưu VT"));
    }

    #[test]
    fn test_recipient_heading_tolerance_is_bounded() {
        // Two substitutions on the folded token still match, three do not
        assert!(is_recipient_heading("Nol nhqn:"));
        assert!(!is_recipient_heading("Nol qhqn:"));
        assert!(!is_recipient_heading("Ghi chú:"));
    }

    #[test]
    fn test_recipient_collapse_respects_max_lines() {
        let opts = PostProcessOptions {
            recipients_max_lines: 2,
            ..PostProcessOptions::default()
        };
        let p = PostProcessor::new(opts).unwrap();
        let input = "Nơi nhận:\n- A;\n- B;\n- C;";
        let out = p.process_page(input);
        assert!(out.contains(". Nơi nhận: A, B"));
        assert!(out.contains("- C"));
    }

    #[test]
    fn test_collapse_disabled_normalizes_heading_only() {
        let opts = PostProcessOptions {
            collapse_recipients: false,
            ..PostProcessOptions::default()
        };
        let p = PostProcessor::new(opts).unwrap();
        let out = p.process_page("Noi nhqn:\n- Như Điều 1;");
        assert!(out.contains("Nơi nhận:"));
        assert!(out.contains("- Như Điều 1;"));
    }

    #[test]
    fn test_continuation_lines_join() {
        let p = processor();
        let input = "Căn cứ Nghị định số 123\nvề chức năng nhiệm vụ";
        assert_eq!(
            p.process_page(input),
            "Căn cứ Nghị định số 123 về chức năng nhiệm vụ"
        );
    }

    #[test]
    fn test_dehyphenation_merges_wrapped_words() {
        let p = processor();
        // "-" at end of line followed by a lowercase start merges
        let input = "Thành phố trực thu-\nộc trung ương";
        let out = p.process_page(input);
        assert!(out.contains("thuộc trung ương"));
        assert!(!out.contains("thu-"));
    }

    #[test]
    fn test_process_page_is_idempotent() {
        let p = processor();
        let input = "Trang 1/2\nQUYẾT ĐỊNH\nVề việc bổ nhiệm cán bộ ™\nNơi nhận:\n- Như trên;\n- Lưu VT;\nCăn cứ luật tổ chức\nchính quyền địa phương";
        let once = p.process_page(input);
        let twice = p.process_page(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_repeated_lines_dropped_across_pages() {
        let opts = PostProcessOptions {
            drop_repeated_lines: true,
            repeated_line_threshold: 0.6,
            ..PostProcessOptions::default()
        };
        let p = PostProcessor::new(opts).unwrap();
        let mut pages = vec![
            "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM\nNội dung trang một".to_string(),
            "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM\nNội dung trang hai".to_string(),
            "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM\nNội dung trang ba".to_string(),
        ];
        p.process_document(&mut pages);
        for page in &pages {
            assert!(!page.contains("CỘNG HÒA"));
            assert!(page.contains("Nội dung"));
        }
    }

    #[test]
    fn test_repeated_line_filter_needs_enough_pages() {
        let opts = PostProcessOptions {
            drop_repeated_lines: true,
            ..PostProcessOptions::default()
        };
        let p = PostProcessor::new(opts).unwrap();
        let mut pages = vec!["Header\nA".to_string(), "Header\nB".to_string()];
        p.process_document(&mut pages);
        assert!(pages[0].contains("Header"));
    }

    #[test]
    fn test_literal_corrections_applied_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrections.json");
        std::fs::write(
            &path,
            r#"{"literals": {"Quyét": "Quyết"}, "patterns": [{"pattern": "\\bUBND\\b", "replacement": "Ủy ban nhân dân"}]}"#,
        )
        .unwrap();
        let p = processor().with_corrections(&path).unwrap();
        let out = p.process_page("Quyét định của UBND tỉnh");
        assert_eq!(out, "Quyết định của Ủy ban nhân dân tỉnh");
    }
}
