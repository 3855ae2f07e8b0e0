//! Reference corpus loading: delimiter-sniffed CSV with verbatim label
//! parsing and precomputed token sets.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::models::ReferenceRecord;
use crate::retrieval::labels::parse_labels;
use crate::retrieval::tokenize::tokenize;

const CANDIDATE_DELIMITERS: &[u8] = &[b',', b'\t', b'|', b';'];

/// Header spellings accepted per column.
const DOC_TYPE_ALIASES: &[&str] = &["doc_type", "document_type", "type", "loai", "loai_van_ban"];
const ISSUER_ALIASES: &[&str] = &["issuer", "co_quan", "noi_ban_hanh", "don_vi"];
const TITLE_ALIASES: &[&str] = &["title", "tieu_de", "trich_yeu"];
const CONTENT_ALIASES: &[&str] = &["content", "noi_dung", "text"];
const LABEL_ALIASES: &[&str] = &["labels", "label", "actions", "action", "nhan", "hanh_dong"];

struct ColumnMap {
    doc_type: usize,
    issuer: usize,
    title: usize,
    content: usize,
    labels: usize,
}

/// The loaded classification corpus. Read-only after load; reloading is an
/// explicit administrative action and is not safe to run concurrently with
/// in-flight ranking calls.
pub struct Corpus {
    path: PathBuf,
    min_content_chars: usize,
    signature: String,
    pub records: Vec<ReferenceRecord>,
}

impl Corpus {
    pub fn load(path: &Path, min_content_chars: usize) -> Result<Self, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::CorpusLoad {
            details: format!("cannot read {}: {}", path.display(), e),
        })?;
        let signature = hex_digest(&bytes);
        let records = parse_corpus(&bytes, min_content_chars)?;
        info!(
            "Loaded corpus from {}: {} usable records",
            path.display(),
            records.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            min_content_chars,
            signature,
            records,
        })
    }

    /// Re-read the corpus file when its content hash has changed. Returns
    /// whether a reload happened.
    pub fn reload_if_changed(&mut self) -> Result<bool, ExtractError> {
        let bytes = std::fs::read(&self.path).map_err(|e| ExtractError::CorpusLoad {
            details: format!("cannot read {}: {}", self.path.display(), e),
        })?;
        let signature = hex_digest(&bytes);
        if signature == self.signature {
            return Ok(false);
        }
        let records = parse_corpus(&bytes, self.min_content_chars)?;
        info!("Corpus changed on disk, reloaded {} records", records.len());
        self.records = records;
        self.signature = signature;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn parse_corpus(bytes: &[u8], min_content_chars: usize) -> Result<Vec<ReferenceRecord>, ExtractError> {
    let (delimiter, columns) = sniff_delimiter(bytes)?;
    debug!("Corpus delimiter detected: {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| ExtractError::CorpusLoad {
            details: format!("row {}: {}", line + 2, e),
        })?;
        let field = |idx: usize| row.get(idx).unwrap_or("").trim().to_string();

        let content = field(columns.content);
        let raw_labels = field(columns.labels);
        let labels = parse_labels(&raw_labels);

        if content.chars().count() < min_content_chars || labels.is_empty() {
            skipped += 1;
            continue;
        }

        let title = field(columns.title);
        let issuer = field(columns.issuer);
        records.push(ReferenceRecord {
            doc_type: field(columns.doc_type),
            content_tokens: tokenize(&content),
            title_tokens: tokenize(&title),
            issuer_tokens: tokenize(&issuer),
            issuer,
            title,
            content,
            raw_labels,
            labels,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} corpus rows (short content or no labels)", skipped);
    }
    if records.is_empty() {
        return Err(ExtractError::CorpusLoad {
            details: "corpus contains no usable records".to_string(),
        });
    }
    Ok(records)
}

/// Try each candidate delimiter against the header row; the first one that
/// yields all five expected columns wins.
fn sniff_delimiter(bytes: &[u8]) -> Result<(u8, ColumnMap), ExtractError> {
    for &delimiter in CANDIDATE_DELIMITERS {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(bytes);
        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(_) => continue,
        };
        if let Some(columns) = resolve_columns(&headers) {
            return Ok((delimiter, columns));
        }
    }
    Err(ExtractError::CorpusLoad {
        details: "header does not match the expected columns under any known delimiter"
            .to_string(),
    })
}

fn resolve_columns(headers: &csv::StringRecord) -> Option<ColumnMap> {
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();
    let find = |aliases: &[&str]| {
        aliases
            .iter()
            .find_map(|alias| index.get(*alias).copied())
    };
    Some(ColumnMap {
        doc_type: find(DOC_TYPE_ALIASES)?,
        issuer: find(ISSUER_ALIASES)?,
        title: find(TITLE_ALIASES)?,
        content: find(CONTENT_ALIASES)?,
        labels: find(LABEL_ALIASES)?,
    })
}
