//! Content-hash-addressed cache of extraction results. Keyed by the SHA-256
//! of the source bytes, so identical inputs never pay recognition cost
//! twice, regardless of filename.
//!
//! Layout: `<cache_dir>/<first two hex chars>/<hash>.txt` holds the full
//! document text; `<hash>.json` holds the metadata with `text` and
//! `page_texts` cleared. Page texts are rebuilt from the page spans on load.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::ExtractionResult;

/// On-disk metadata sidecar: the extraction result (text fields cleared)
/// plus when it was stored.
#[derive(Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    #[serde(flatten)]
    result: ExtractionResult,
}

pub struct ExtractionCache {
    root: PathBuf,
    enabled: bool,
}

/// Hex SHA-256 of the source bytes.
pub fn content_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl ExtractionCache {
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            root: root.into(),
            enabled,
        }
    }

    fn entry_paths(&self, key: &str) -> (PathBuf, PathBuf) {
        let shard = self.root.join(&key[..2.min(key.len())]);
        (shard.join(format!("{}.txt", key)), shard.join(format!("{}.json", key)))
    }

    /// Look up a previous result for these source bytes. Corrupt or
    /// partially written entries are treated as misses.
    pub fn load(&self, key: &str) -> Option<ExtractionResult> {
        if !self.enabled {
            return None;
        }
        let (text_path, meta_path) = self.entry_paths(key);
        if !text_path.exists() || !meta_path.exists() {
            return None;
        }

        match self.read_entry(&text_path, &meta_path) {
            Ok(result) => {
                debug!("Extraction cache hit for {}", key);
                Some(result)
            }
            Err(err) => {
                warn!("Discarding unreadable cache entry {}: {}", key, err);
                None
            }
        }
    }

    fn read_entry(&self, text_path: &Path, meta_path: &Path) -> Result<ExtractionResult> {
        let text = fs::read_to_string(text_path).context("reading cached text")?;
        let meta = fs::read_to_string(meta_path).context("reading cached metadata")?;
        let entry: CacheEntry = serde_json::from_str(&meta).context("parsing cached metadata")?;
        let mut result = entry.result;

        let chars: Vec<char> = text.chars().collect();
        let mut page_texts = Vec::with_capacity(result.page_spans.len());
        for &(start, end) in &result.page_spans {
            if start > end || end > chars.len() {
                anyhow::bail!("cached page span [{}, {}) out of bounds", start, end);
            }
            page_texts.push(chars[start..end].iter().collect::<String>());
        }

        result.text = text;
        result.page_texts = page_texts;
        result.cache_hit = true;
        Ok(result)
    }

    /// Persist a successful extraction. Failures are never cached, and a
    /// store error only costs the caching benefit, not the extraction.
    pub fn store(&self, key: &str, result: &ExtractionResult) {
        if !self.enabled || !result.ok {
            return;
        }
        if let Err(err) = self.write_entry(key, result) {
            warn!("Failed to write cache entry {}: {}", key, err);
        }
    }

    fn write_entry(&self, key: &str, result: &ExtractionResult) -> Result<()> {
        let (text_path, meta_path) = self.entry_paths(key);
        if let Some(parent) = text_path.parent() {
            fs::create_dir_all(parent).context("creating cache shard directory")?;
        }

        let mut meta = result.clone();
        meta.text = String::new();
        meta.page_texts = Vec::new();
        meta.cache_hit = false;
        let entry = CacheEntry {
            stored_at: Utc::now(),
            result: meta,
        };
        let meta_json = serde_json::to_string(&entry).context("serializing cache metadata")?;

        // Text first, metadata last: a crash in between leaves a partial
        // entry that load() treats as a miss
        write_atomic(&text_path, result.text.as_bytes())?;
        write_atomic(&meta_path, meta_json.as_bytes())?;
        debug!("Stored extraction cache entry {}", key);
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
