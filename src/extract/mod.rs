//! Format-specific text readers for structured (non-scanned) documents.
//! Extraction is total: every failure path returns a `StructuredText` with
//! `ok = false` instead of propagating an error, so callers can treat any
//! file as extractable-or-empty.

pub mod office;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Marker appended when a sheet is cut off by the cell ceiling.
pub(crate) const SHEET_TRUNCATION_MARKER: &str = "…";

const WORD_EXTENSIONS: &[&str] = &["doc", "docx", "rtf", "odt"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "ods"];
const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx", "odp"];
const CODE_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "log", "json", "yaml", "yml", "toml", "ini", "cfg", "xml",
    "html", "htm", "css", "js", "ts", "jsx", "tsx", "py", "rs", "go", "java", "c", "cpp", "h",
    "hpp", "cs", "rb", "php", "sh", "bash", "sql", "r", "kt", "swift", "scala", "pl", "lua",
];

/// Uniform output of structured extraction. `pages` is populated for
/// formats with a natural segmentation (sheets, slides); otherwise the
/// whole text is a single implicit page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredText {
    pub ok: bool,
    pub text: String,
    pub pages: Vec<String>,
    pub note: Option<String>,
}

impl StructuredText {
    fn single(text: String) -> Self {
        Self {
            ok: true,
            text,
            pages: Vec::new(),
            note: None,
        }
    }

    fn paged(pages: Vec<String>) -> Self {
        Self {
            ok: true,
            text: pages.join("\n\n"),
            pages,
            note: None,
        }
    }

    fn failure(note: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: String::new(),
            pages: Vec::new(),
            note: Some(note.into()),
        }
    }
}

/// Size ceilings bounding extraction work per file.
#[derive(Debug, Clone)]
pub struct ExtractLimits {
    /// Per-sheet cell ceiling for spreadsheets
    pub max_cells_per_sheet: usize,
    /// Slide ceiling for presentations
    pub max_slides: usize,
    /// Byte ceiling for plain-text/code reads
    pub max_plain_bytes: usize,
    /// Per-entry XML size ceiling inside ZIP containers
    pub max_xml_bytes: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_cells_per_sheet: 10_000,
            max_slides: 200,
            max_plain_bytes: 2 * 1024 * 1024,
            max_xml_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Extract text from a structured document, dispatching on the file
/// extension. Never panics and never returns `Err`; corrupt or unreadable
/// inputs yield a failure result.
pub fn extract_structured(path: &Path, limits: &ExtractLimits) -> StructuredText {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let result = if WORD_EXTENSIONS.contains(&extension.as_str()) {
        word_document(path, &extension, limits)
    } else if extension == "csv" {
        csv_text(path)
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        spreadsheet(path, limits)
    } else if PRESENTATION_EXTENSIONS.contains(&extension.as_str()) {
        presentation(path, limits)
    } else if extension == "svg" {
        svg_text(path, limits)
    } else if extension == "ipynb" {
        notebook_text(path, limits)
    } else if CODE_EXTENSIONS.contains(&extension.as_str()) {
        plain_text(path, limits)
    } else {
        // Unrecognized extension: best-effort plain read
        debug!("No dedicated reader for .{}, trying plain text", extension);
        plain_text(path, limits)
    };

    if !result.ok {
        warn!(
            "Structured extraction failed for {}: {}",
            path.display(),
            result.note.as_deref().unwrap_or("unknown")
        );
    }
    result
}

/// Word-processor chain: container XML first, then format-specific
/// degradations, down to a raw printable-run scan for legacy binaries.
fn word_document(path: &Path, extension: &str, limits: &ExtractLimits) -> StructuredText {
    if extension == "rtf" {
        return match std::fs::read(path) {
            Ok(bytes) => StructuredText::single(strip_rtf(&String::from_utf8_lossy(&bytes))),
            Err(err) => StructuredText::failure(format!("cannot read RTF: {}", err)),
        };
    }

    match office::word_text(path, limits) {
        Ok(text) if !text.trim().is_empty() => StructuredText::single(text),
        Ok(_) => StructuredText::failure("document contains no text"),
        Err(err) => {
            // Legacy binary .doc, or a damaged container: salvage what we can
            debug!("Container extraction failed ({}), scanning raw bytes", err);
            match std::fs::read(path) {
                Ok(bytes) => {
                    let salvaged = printable_runs(&bytes);
                    if salvaged.trim().is_empty() {
                        StructuredText::failure(format!("no recoverable text: {}", err))
                    } else {
                        let mut result = StructuredText::single(salvaged);
                        result.note = Some("recovered via raw byte scan".to_string());
                        result
                    }
                }
                Err(read_err) => StructuredText::failure(format!("cannot read file: {}", read_err)),
            }
        }
    }
}

fn spreadsheet(path: &Path, limits: &ExtractLimits) -> StructuredText {
    match office::spreadsheet_pages(path, limits) {
        Ok(pages) if !pages.is_empty() => StructuredText::paged(pages),
        Ok(_) => StructuredText::failure("workbook contains no sheets"),
        Err(err) => match std::fs::read(path) {
            Ok(bytes) => {
                let salvaged = printable_runs(&bytes);
                if salvaged.trim().is_empty() {
                    StructuredText::failure(format!("no recoverable text: {}", err))
                } else {
                    let mut result = StructuredText::single(salvaged);
                    result.note = Some("recovered via raw byte scan".to_string());
                    result
                }
            }
            Err(read_err) => StructuredText::failure(format!("cannot read file: {}", read_err)),
        },
    }
}

fn presentation(path: &Path, limits: &ExtractLimits) -> StructuredText {
    match office::presentation_pages(path, limits) {
        Ok(pages) if !pages.is_empty() => StructuredText::paged(pages),
        Ok(_) => StructuredText::failure("presentation contains no slides"),
        Err(err) => StructuredText::failure(format!("cannot read presentation: {}", err)),
    }
}

/// CSV: one page, each row's non-empty cells joined with `" | "`.
fn csv_text(path: &Path) -> StructuredText {
    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(err) => return StructuredText::failure(format!("cannot open CSV: {}", err)),
    };

    let mut lines = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => {
                let cells: Vec<&str> = record
                    .iter()
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty())
                    .collect();
                if !cells.is_empty() {
                    lines.push(cells.join(" | "));
                }
            }
            Err(err) => return StructuredText::failure(format!("CSV parse error: {}", err)),
        }
    }
    StructuredText::single(lines.join("\n"))
}

/// SVG: prefer explicit `<text>`/`<tspan>` content; fall back to stripping
/// all markup when the file has no text elements.
fn svg_text(path: &Path, limits: &ExtractLimits) -> StructuredText {
    use quick_xml::events::Event;

    let raw = match read_capped(path, limits.max_plain_bytes) {
        Ok(raw) => raw,
        Err(err) => return StructuredText::failure(err),
    };

    let mut reader = quick_xml::Reader::from_str(&raw);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_element = 0usize;
    let mut text_lines = Vec::new();
    let mut all_text = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if matches!(e.name().as_ref(), b"text" | b"tspan" | b"textPath") {
                    in_text_element += 1;
                }
            }
            Ok(Event::End(ref e)) => {
                if matches!(e.name().as_ref(), b"text" | b"tspan" | b"textPath") {
                    in_text_element = in_text_element.saturating_sub(1);
                }
            }
            Ok(Event::Text(e)) => {
                if let Ok(text) = e.unescape() {
                    let line = text.trim().to_string();
                    if !line.is_empty() {
                        if in_text_element > 0 {
                            text_lines.push(line.clone());
                        }
                        all_text.push(line);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return StructuredText::failure(format!("SVG parse error: {}", err)),
            _ => {}
        }
        buf.clear();
    }

    let chosen = if !text_lines.is_empty() {
        text_lines
    } else {
        all_text
    };
    StructuredText::single(chosen.join("\n"))
}

/// Jupyter notebook: markdown and code cell sources concatenated in order.
/// Code is kept verbatim, never executed.
fn notebook_text(path: &Path, limits: &ExtractLimits) -> StructuredText {
    let raw = match read_capped(path, limits.max_plain_bytes) {
        Ok(raw) => raw,
        Err(err) => return StructuredText::failure(err),
    };
    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => return StructuredText::failure(format!("invalid notebook JSON: {}", err)),
    };

    let mut sections = Vec::new();
    if let Some(cells) = value.get("cells").and_then(|c| c.as_array()) {
        for cell in cells {
            let kind = cell.get("cell_type").and_then(|t| t.as_str()).unwrap_or("");
            if kind != "markdown" && kind != "code" {
                continue;
            }
            let source = match cell.get("source") {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Array(parts)) => parts
                    .iter()
                    .filter_map(|p| p.as_str())
                    .collect::<String>(),
                _ => continue,
            };
            if !source.trim().is_empty() {
                sections.push(source.trim_end().to_string());
            }
        }
    }
    StructuredText::single(sections.join("\n\n"))
}

fn plain_text(path: &Path, limits: &ExtractLimits) -> StructuredText {
    match read_capped(path, limits.max_plain_bytes) {
        Ok(text) => StructuredText::single(text),
        Err(err) => StructuredText::failure(err),
    }
}

/// Lossy read truncated at the byte ceiling (at a char boundary).
fn read_capped(path: &Path, max_bytes: usize) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let slice = if bytes.len() > max_bytes {
        &bytes[..max_bytes]
    } else {
        &bytes[..]
    };
    Ok(String::from_utf8_lossy(slice).into_owned())
}

/// Last-resort salvage for legacy binary formats: keep printable runs of at
/// least four characters, from both a raw ASCII scan and a UTF-16LE scan,
/// whichever recovers more.
fn printable_runs(bytes: &[u8]) -> String {
    const MIN_RUN: usize = 4;

    let ascii = scan_runs(bytes.iter().copied(), MIN_RUN);
    let utf16: Vec<u8> = bytes
        .chunks_exact(2)
        .filter(|pair| pair[1] == 0)
        .map(|pair| pair[0])
        .collect();
    let wide = scan_runs(utf16.into_iter(), MIN_RUN);

    if wide.len() > ascii.len() {
        wide
    } else {
        ascii
    }
}

fn scan_runs(bytes: impl Iterator<Item = u8>, min_run: usize) -> String {
    let mut out = String::new();
    let mut run = String::new();
    for byte in bytes {
        if (0x20..0x7f).contains(&byte) {
            run.push(byte as char);
        } else {
            if run.trim().len() >= min_run {
                out.push_str(run.trim());
                out.push('\n');
            }
            run.clear();
        }
    }
    if run.trim().len() >= min_run {
        out.push_str(run.trim());
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Drop RTF control words and group braces, keeping the visible text.
fn strip_rtf(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' | '}' => {}
            '\\' => {
                match chars.peek() {
                    // Escaped literal brace or backslash
                    Some('{') | Some('}') | Some('\\') => {
                        if let Some(literal) = chars.next() {
                            out.push(literal);
                        }
                    }
                    // Hex escape \'xx
                    Some('\'') => {
                        chars.next();
                        chars.next();
                        chars.next();
                        out.push(' ');
                    }
                    _ => {
                        // Control word: consume letters and an optional
                        // numeric argument, then one delimiter space
                        let mut word = String::new();
                        while let Some(&next) = chars.peek() {
                            if next.is_ascii_alphabetic() || next == '-' || next.is_ascii_digit() {
                                word.push(next);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        if chars.peek() == Some(&' ') {
                            chars.next();
                        }
                        if matches!(word.trim_end_matches(|c: char| c.is_ascii_digit() || c == '-'),
                            "par" | "line" | "cell" | "row")
                        {
                            out.push('\n');
                        }
                    }
                }
            }
            '\r' | '\n' => {}
            other => out.push(other),
        }
    }
    out.trim().to_string()
}
