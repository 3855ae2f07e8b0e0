//! ZIP-container office format readers (OOXML and OpenDocument), built on
//! streaming XML parsing with entry-name validation and size ceilings so a
//! hostile archive cannot traverse paths or expand unbounded.

use anyhow::{anyhow, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

use super::{ExtractLimits, SHEET_TRUNCATION_MARKER};

const MAX_ENTRY_NAME_LENGTH: usize = 255;

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    ZipArchive::new(file).context("reading ZIP container")
}

/// Reject entry names that smell like traversal or platform path tricks.
fn validate_entry_name(name: &str) -> Result<()> {
    if name.len() > MAX_ENTRY_NAME_LENGTH {
        return Err(anyhow!("ZIP entry name too long ({} chars)", name.len()));
    }
    if name.contains("..") {
        return Err(anyhow!("ZIP entry contains directory traversal: '{}'", name));
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(anyhow!("ZIP entry contains absolute path: '{}'", name));
    }
    if name.len() >= 2 && name.chars().nth(1) == Some(':') {
        return Err(anyhow!("ZIP entry contains drive letter: '{}'", name));
    }
    Ok(())
}

/// Read a ZIP entry with a hard size ceiling.
fn read_entry_safely<R: Read>(reader: &mut R, max_size: u64) -> Result<String> {
    let mut buffer = Vec::new();
    let mut total = 0u64;
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk)? {
            0 => break,
            n => {
                total += n as u64;
                if total > max_size {
                    return Err(anyhow!(
                        "ZIP entry exceeds the {:.1} MB ceiling",
                        max_size as f64 / (1024.0 * 1024.0)
                    ));
                }
                buffer.extend_from_slice(&chunk[..n]);
            }
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn read_named_entry(archive: &mut ZipArchive<File>, name: &str, max_size: u64) -> Result<String> {
    validate_entry_name(name)?;
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("entry '{}' not found", name))?;
    read_entry_safely(&mut entry, max_size)
}

fn secure_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.expand_empty_elements = false;
    reader
}

fn attr_value(e: &quick_xml::events::BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Paragraph text from any XML where paragraphs close with one of the
/// given element names. Text nodes inside a paragraph are concatenated;
/// each closing tag emits one line. Covers docx (`w:p`), odt (`text:p`,
/// `text:h`), including paragraphs nested in tables.
fn paragraphs_from_xml(xml: &str, paragraph_ends: &[&[u8]]) -> Result<Vec<String>> {
    let mut reader = secure_reader(xml);
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut paragraphs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::Empty(ref e)) => {
                // Tabs and explicit breaks inside a docx paragraph
                match e.name().as_ref() {
                    b"w:tab" => current.push('\t'),
                    b"w:br" | b"text:line-break" => current.push('\n'),
                    b"text:tab" => current.push('\t'),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if paragraph_ends.contains(&e.name().as_ref()) {
                    let line = current.trim().to_string();
                    if !line.is_empty() {
                        paragraphs.push(line);
                    }
                    current.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    Ok(paragraphs)
}

/// Word-processor container: docx (`word/document.xml`) or odt
/// (`content.xml`).
pub fn word_text(path: &Path, limits: &ExtractLimits) -> Result<String> {
    let mut archive = open_archive(path)?;
    let (entry, ends): (&str, &[&[u8]]) = if archive.by_name("word/document.xml").is_ok() {
        ("word/document.xml", &[b"w:p".as_slice()])
    } else {
        ("content.xml", &[b"text:p".as_slice(), b"text:h".as_slice()])
    };
    let xml = read_named_entry(&mut archive, entry, limits.max_xml_bytes)?;
    let paragraphs = paragraphs_from_xml(&xml, ends)?;
    debug!("Extracted {} paragraphs from {}", paragraphs.len(), path.display());
    Ok(paragraphs.join("\n"))
}

/// Spreadsheet container: xlsx or ods. One page per sheet, each opened by a
/// `[Sheet name]` header line, rows rendered as `cell | cell | cell`.
pub fn spreadsheet_pages(path: &Path, limits: &ExtractLimits) -> Result<Vec<String>> {
    let mut archive = open_archive(path)?;
    if archive.by_name("xl/workbook.xml").is_ok() {
        xlsx_pages(&mut archive, limits)
    } else {
        ods_pages(&mut archive, limits)
    }
}

fn xlsx_pages(archive: &mut ZipArchive<File>, limits: &ExtractLimits) -> Result<Vec<String>> {
    let shared = match read_named_entry(archive, "xl/sharedStrings.xml", limits.max_xml_bytes) {
        Ok(xml) => parse_shared_strings(&xml)?,
        Err(_) => Vec::new(),
    };
    let sheet_names = xlsx_sheet_names(archive, limits)?;

    // Worksheet entries in workbook order (sheetN.xml numbering)
    let mut sheet_entries: Vec<(usize, String)> = Vec::new();
    for name in archive.file_names() {
        if let Some(rest) = name.strip_prefix("xl/worksheets/sheet") {
            if let Some(num) = rest.strip_suffix(".xml").and_then(|n| n.parse::<usize>().ok()) {
                sheet_entries.push((num, name.to_string()));
            }
        }
    }
    sheet_entries.sort();

    let mut pages = Vec::new();
    for (position, (_, entry)) in sheet_entries.into_iter().enumerate() {
        let xml = read_named_entry(archive, &entry, limits.max_xml_bytes)?;
        let rows = parse_xlsx_sheet(&xml, &shared, limits.max_cells_per_sheet)?;
        let title = sheet_names
            .get(position)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{}", position + 1));
        pages.push(format!("[{}]\n{}", title, rows.join("\n")));
    }
    Ok(pages)
}

fn xlsx_sheet_names(archive: &mut ZipArchive<File>, limits: &ExtractLimits) -> Result<Vec<String>> {
    let xml = read_named_entry(archive, "xl/workbook.xml", limits.max_xml_bytes)?;
    let mut reader = secure_reader(&xml);
    let mut buf = Vec::new();
    let mut names = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"sheet" {
                    if let Some(name) = attr_value(e, b"name") {
                        names.push(name);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Error parsing workbook.xml: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = secure_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"si" => {
                in_si = true;
                current.clear();
            }
            Ok(Event::Text(e)) if in_si => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"si" => {
                in_si = false;
                strings.push(current.clone());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error in sharedStrings: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn parse_xlsx_sheet(xml: &str, shared: &[String], max_cells: usize) -> Result<Vec<String>> {
    let mut reader = secure_reader(xml);
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_buf = String::new();
    let mut cell_is_shared = false;
    let mut in_cell = false;
    let mut cells_seen = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"c" => {
                in_cell = true;
                cell_buf.clear();
                cell_is_shared = attr_value(e, b"t").as_deref() == Some("s");
            }
            Ok(Event::Text(e)) if in_cell => {
                if let Ok(text) = e.unescape() {
                    cell_buf.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"c" => {
                    in_cell = false;
                    cells_seen += 1;
                    let value = if cell_is_shared {
                        cell_buf
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|idx| shared.get(idx).cloned())
                            .unwrap_or_default()
                    } else {
                        cell_buf.trim().to_string()
                    };
                    if !value.is_empty() {
                        row.push(value);
                    }
                    if cells_seen >= max_cells {
                        if !row.is_empty() {
                            lines.push(row.join(" | "));
                        }
                        lines.push(SHEET_TRUNCATION_MARKER.to_string());
                        return Ok(lines);
                    }
                }
                b"row" => {
                    if !row.is_empty() {
                        lines.push(row.join(" | "));
                    }
                    row.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error in worksheet: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(lines)
}

fn ods_pages(archive: &mut ZipArchive<File>, limits: &ExtractLimits) -> Result<Vec<String>> {
    let xml = read_named_entry(archive, "content.xml", limits.max_xml_bytes)?;
    let mut reader = secure_reader(&xml);
    let mut buf = Vec::new();
    let mut pages = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_buf = String::new();
    let mut in_cell = false;
    let mut table_name = String::new();
    let mut cells_seen = 0usize;
    let mut truncated = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"table:table" => {
                    table_name = attr_value(e, b"table:name")
                        .unwrap_or_else(|| format!("Sheet{}", pages.len() + 1));
                    lines.clear();
                    cells_seen = 0;
                    truncated = false;
                }
                b"table:table-cell" => {
                    in_cell = true;
                    cell_buf.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_cell => {
                if let Ok(text) = e.unescape() {
                    cell_buf.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"table:table-cell" => {
                    in_cell = false;
                    cells_seen += 1;
                    if !truncated {
                        let value = cell_buf.trim().to_string();
                        if !value.is_empty() {
                            row.push(value);
                        }
                        if cells_seen >= limits.max_cells_per_sheet {
                            truncated = true;
                        }
                    }
                }
                b"table:table-row" => {
                    if !row.is_empty() {
                        lines.push(row.join(" | "));
                    }
                    row.clear();
                }
                b"table:table" => {
                    if truncated {
                        lines.push(SHEET_TRUNCATION_MARKER.to_string());
                    }
                    pages.push(format!("[{}]\n{}", table_name, lines.join("\n")));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error in content.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(pages)
}

/// Presentation container: pptx or odp. One page per slide, prefixed with a
/// slide-number label; pptx speaker notes are appended to their slide.
pub fn presentation_pages(path: &Path, limits: &ExtractLimits) -> Result<Vec<String>> {
    let mut archive = open_archive(path)?;
    if archive.by_name("ppt/presentation.xml").is_ok() {
        pptx_pages(&mut archive, limits)
    } else {
        odp_pages(&mut archive, limits)
    }
}

fn pptx_pages(archive: &mut ZipArchive<File>, limits: &ExtractLimits) -> Result<Vec<String>> {
    let mut slide_numbers: Vec<usize> = Vec::new();
    for name in archive.file_names() {
        if let Some(rest) = name.strip_prefix("ppt/slides/slide") {
            if let Some(num) = rest.strip_suffix(".xml").and_then(|n| n.parse::<usize>().ok()) {
                slide_numbers.push(num);
            }
        }
    }
    slide_numbers.sort();
    if slide_numbers.len() > limits.max_slides {
        warn!(
            "Deck has {} slides, keeping the first {}",
            slide_numbers.len(),
            limits.max_slides
        );
        slide_numbers.truncate(limits.max_slides);
    }

    let mut pages = Vec::new();
    for num in slide_numbers {
        let entry = format!("ppt/slides/slide{}.xml", num);
        let xml = read_named_entry(archive, &entry, limits.max_xml_bytes)?;
        let mut body = paragraphs_from_xml(&xml, &[b"a:p".as_slice()])?.join("\n");

        let notes_entry = format!("ppt/notesSlides/notesSlide{}.xml", num);
        if let Ok(notes_xml) = read_named_entry(archive, &notes_entry, limits.max_xml_bytes) {
            let notes = paragraphs_from_xml(&notes_xml, &[b"a:p".as_slice()])?.join("\n");
            if !notes.trim().is_empty() {
                body.push_str("\nGhi chú: ");
                body.push_str(notes.trim());
            }
        }
        pages.push(format!("[Slide {}]\n{}", num, body));
    }
    Ok(pages)
}

fn odp_pages(archive: &mut ZipArchive<File>, limits: &ExtractLimits) -> Result<Vec<String>> {
    let xml = read_named_entry(archive, "content.xml", limits.max_xml_bytes)?;
    let mut reader = secure_reader(&xml);
    let mut buf = Vec::new();
    let mut pages: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut paragraph = String::new();
    let mut in_page = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"draw:page" => {
                in_page = true;
                current.clear();
            }
            Ok(Event::Text(e)) if in_page => {
                if let Ok(text) = e.unescape() {
                    paragraph.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"text:p" if in_page => {
                    let line = paragraph.trim();
                    if !line.is_empty() {
                        current.push_str(line);
                        current.push('\n');
                    }
                    paragraph.clear();
                }
                b"draw:page" => {
                    in_page = false;
                    pages.push(format!("[Slide {}]\n{}", pages.len() + 1, current.trim()));
                    if pages.len() >= limits.max_slides {
                        return Ok(pages);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error in content.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_validation() {
        assert!(validate_entry_name("word/document.xml").is_ok());
        assert!(validate_entry_name("xl/worksheets/sheet1.xml").is_ok());
        assert!(validate_entry_name("../../../etc/passwd").is_err());
        assert!(validate_entry_name("/etc/passwd").is_err());
        assert!(validate_entry_name("C:\\windows\\cmd.exe").is_err());
        let long_name = "a/".repeat(200);
        assert!(validate_entry_name(&long_name).is_err());
    }

    #[test]
    fn test_read_entry_size_ceiling() {
        let data = vec![b'x'; 2048];
        let mut cursor = std::io::Cursor::new(&data);
        assert!(read_entry_safely(&mut cursor, 1024).is_err());
        let mut cursor = std::io::Cursor::new(&data);
        assert!(read_entry_safely(&mut cursor, 4096).is_ok());
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Điều 1. Phạm vi</w:t></w:r></w:p>
            <w:p><w:r><w:t>Điều 2. </w:t></w:r><w:r><w:t>Đối tượng</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paragraphs = paragraphs_from_xml(xml, &[b"w:p".as_slice()]).unwrap();
        assert_eq!(paragraphs, vec!["Điều 1. Phạm vi", "Điều 2. Đối tượng"]);
    }

    #[test]
    fn test_shared_strings_parsing() {
        let xml = r#"<sst><si><t>Họ tên</t></si><si><r><t>Phòng </t></r><r><t>ban</t></r></si></sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["Họ tên", "Phòng ban"]);
    }

    #[test]
    fn test_xlsx_sheet_rows_with_shared_strings() {
        let shared = vec!["Tên".to_string(), "Chức vụ".to_string()];
        let xml = r#"<worksheet><sheetData>
            <row><c t="s"><v>0</v></c><c t="s"><v>1</v></c></row>
            <row><c><v>42</v></c><c/></row>
        </sheetData></worksheet>"#;
        let rows = parse_xlsx_sheet(xml, &shared, 1000).unwrap();
        assert_eq!(rows, vec!["Tên | Chức vụ", "42"]);
    }

    #[test]
    fn test_xlsx_sheet_cell_ceiling() {
        let xml = r#"<worksheet><sheetData>
            <row><c><v>a</v></c><c><v>b</v></c><c><v>c</v></c></row>
        </sheetData></worksheet>"#;
        let rows = parse_xlsx_sheet(xml, &[], 2).unwrap();
        assert!(rows.last().map(|l| l.contains('…')).unwrap_or(false));
    }
}
