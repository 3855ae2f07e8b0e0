use serde::{Deserialize, Serialize};

/// How a page's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageSource {
    /// Native text layer of a PDF page, no recognition needed
    PdfText,
    /// Rasterized PDF page routed through an OCR engine
    Ocr,
    /// Standalone image file routed through an OCR engine
    ImageOcr,
    /// Page dropped by noise suppression
    Skipped,
    /// Recognition or extraction failed for this page
    Error,
}

impl PageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSource::PdfText => "pdf-text",
            PageSource::Ocr => "ocr",
            PageSource::ImageOcr => "image-ocr",
            PageSource::Skipped => "skipped",
            PageSource::Error => "error",
        }
    }
}

/// Per-page processing record. Created once during orchestration and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    /// 0-based page index
    pub index: usize,
    pub source: PageSource,
    /// Characters produced for this page after post-processing
    pub chars: usize,
    pub duration_ms: u64,
    /// Rasterization resolution, when the page was rendered for OCR
    pub dpi: Option<u32>,
    /// Average recognition confidence in 0..1, when the engine reports one
    pub confidence: Option<f32>,
    /// Engine used or error message
    pub note: Option<String>,
}

/// Character-level quality signals for the assembled text.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub diacritic_ratio: f64,
    pub ascii_word_ratio: f64,
}

/// Outcome of processing one source file. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub ok: bool,
    /// Full normalized document text
    pub text: String,
    /// Per-page text segments, ordered by page index
    pub page_texts: Vec<String>,
    /// `[start, end)` char spans of each page within `text`. Always one span
    /// per page; spans are ordered and non-overlapping, and tile the full
    /// text up to the configured separator.
    pub page_spans: Vec<(usize, usize)>,
    pub total_pages: usize,
    /// Pages that required recognition rather than native text
    pub ocr_pages: usize,
    /// Engines that contributed to this result
    pub engines_used: Vec<String>,
    pub avg_confidence: Option<f32>,
    pub quality: QualityMetrics,
    pub cache_hit: bool,
    pub error: Option<String>,
    pub pages: Vec<PageInfo>,
}

impl ExtractionResult {
    /// A failure result carrying no text. Extraction is total: callers get
    /// this instead of an error for any input kind the core claims to
    /// support.
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: String::new(),
            page_texts: Vec::new(),
            page_spans: Vec::new(),
            total_pages: 0,
            ocr_pages: 0,
            engines_used: Vec::new(),
            avg_confidence: None,
            quality: QualityMetrics::default(),
            cache_hit: false,
            error: Some(detail.into()),
            pages: Vec::new(),
        }
    }
}
