use anyhow::{anyhow, Result};
use std::env;

use crate::ocr::engine::BackendPolicy;
use crate::ocr::postprocess::PostProcessOptions;
use crate::ocr::preprocess::UpscaleOptions;

/// Runtime configuration, loaded from environment variables with defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tesseract-style language hint for plain image OCR
    pub ocr_image_lang: String,
    /// Language hint for rasterized PDF pages (independently configurable)
    pub ocr_pdf_lang: String,
    /// Baseline rasterization resolution for pages that need OCR
    pub ocr_min_dpi: u32,
    /// Page-count ceiling per document
    pub ocr_max_pages: usize,
    /// Engine selection policy
    pub ocr_backend: BackendPolicy,
    /// Bypass the native-text fast path and OCR every page
    pub force_ocr: bool,
    /// Minimum native text length (chars) for a PDF page to skip OCR
    pub native_text_min_chars: usize,
    /// Cap on rasterized image size to bound memory
    pub max_render_pixels: u64,
    pub upscale: UpscaleOptions,
    /// Hardware acceleration available for the neural engine; in `auto`
    /// mode this makes the neural engine the primary attempt
    pub neural_accel: bool,
    /// Directory holding the neural engine's model files
    pub paddle_model_dir: Option<String>,

    pub postprocess: PostProcessOptions,
    /// Optional JSON file with user-supplied literal/regex corrections
    pub corrections_path: Option<String>,

    /// Separator inserted between page texts in the assembled document
    pub page_separator: String,
    /// Insert a `[Trang N]` marker ahead of each page (off by default)
    pub insert_page_headers: bool,
    /// Drop pages that look like pure ASCII scanner noise (off by default)
    pub suppress_noise_pages: bool,

    pub cache_dir: String,
    pub cache_enabled: bool,

    pub rag_corpus_path: Option<String>,
    pub rag_top_k: usize,
    pub rag_top_k_max: usize,
    pub rag_expand_ratio: f64,
    pub rag_min_score: f64,
    pub rag_dedup_jaccard: f64,
    pub rag_min_content_chars: usize,

    /// Prompt length (chars) that hard-forces the high reasoning tier
    pub reasoning_length_threshold: usize,
    /// Whether the LLM tier router is consulted at all
    pub auto_tier_enabled: bool,
    pub router_url: Option<String>,
    pub router_model: String,
    pub router_timeout_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v
            .parse::<T>()
            .map_err(|_| anyhow!("invalid value for {}: {}", key, v)),
        _ => Ok(default),
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let backend = match env_or("OCR_BACKEND", "auto").to_lowercase().as_str() {
            "auto" => BackendPolicy::Auto,
            "tesseract" | "classical" => BackendPolicy::ForceClassical,
            "paddle" | "neural" => BackendPolicy::ForceNeural,
            other => return Err(anyhow!("invalid OCR_BACKEND: {}", other)),
        };

        let config = Self {
            ocr_image_lang: env_or("OCR_IMAGE_LANG", "vie+eng"),
            ocr_pdf_lang: env_or("OCR_PDF_LANG", "vie"),
            ocr_min_dpi: env_parse("OCR_MIN_DPI", 200u32)?,
            ocr_max_pages: env_parse("OCR_MAX_PAGES", 50usize)?,
            ocr_backend: backend,
            force_ocr: env_bool("OCR_FORCE", false),
            native_text_min_chars: env_parse("OCR_NATIVE_TEXT_MIN_CHARS", 120usize)?,
            max_render_pixels: env_parse("OCR_MAX_PIXELS", 40_000_000u64)?,
            upscale: UpscaleOptions {
                enabled: env_bool("OCR_UPSCALE_ENABLED", true),
                min_side: env_parse("OCR_UPSCALE_MIN_SIDE", 1000u32)?,
                max_factor: env_parse("OCR_UPSCALE_MAX_FACTOR", 3.0f32)?,
                max_side: env_parse("OCR_UPSCALE_MAX_SIDE", 4096u32)?,
                max_pixels: env_parse("OCR_UPSCALE_MAX_PIXELS", 16_000_000u64)?,
            },
            neural_accel: env_bool("OCR_NEURAL_ACCEL", false),
            paddle_model_dir: env_opt("OCR_PADDLE_MODEL_DIR"),
            postprocess: PostProcessOptions {
                strip_page_banners: env_bool("POSTPROCESS_STRIP_BANNERS", true),
                charset_cleanup: env_bool("POSTPROCESS_CHARSET_CLEANUP", true),
                collapse_recipients: env_bool("POSTPROCESS_COLLAPSE_RECIPIENTS", true),
                recipients_max_lines: env_parse("POSTPROCESS_RECIPIENTS_MAX_LINES", 8usize)?,
                unicode_nfc: env_bool("POSTPROCESS_UNICODE_NFC", true),
                join_continuations: env_bool("POSTPROCESS_JOIN_CONTINUATIONS", true),
                drop_repeated_lines: env_bool("POSTPROCESS_DROP_REPEATED_LINES", false),
                repeated_line_threshold: env_parse("POSTPROCESS_REPEATED_LINE_THRESHOLD", 0.6f64)?,
            },
            corrections_path: env_opt("POSTPROCESS_CORRECTIONS_PATH"),
            page_separator: env_or("EXTRACTION_PAGE_SEPARATOR", "\n\n"),
            insert_page_headers: env_bool("EXTRACTION_PAGE_HEADERS", false),
            suppress_noise_pages: env_bool("EXTRACTION_SUPPRESS_NOISE_PAGES", false),
            cache_dir: env_or("EXTRACTION_CACHE_DIR", "./cache/extraction"),
            cache_enabled: env_bool("EXTRACTION_CACHE_ENABLED", true),
            rag_corpus_path: env_opt("RAG_CORPUS_PATH"),
            rag_top_k: env_parse("RAG_TOP_K", 5usize)?,
            rag_top_k_max: env_parse("RAG_TOP_K_MAX", 15usize)?,
            rag_expand_ratio: env_parse("RAG_EXPAND_RATIO", 0.9f64)?,
            rag_min_score: env_parse("RAG_MIN_SCORE", 0.05f64)?,
            rag_dedup_jaccard: env_parse("RAG_DEDUP_JACCARD", 0.85f64)?,
            rag_min_content_chars: env_parse("RAG_MIN_CONTENT_CHARS", 30usize)?,
            reasoning_length_threshold: env_parse("REASONING_LENGTH_THRESHOLD", 1000usize)?,
            auto_tier_enabled: env_bool("REASONING_AUTO_TIER_ENABLED", false),
            router_url: env_opt("REASONING_ROUTER_URL"),
            router_model: env_or("REASONING_ROUTER_MODEL", "router-mini"),
            router_timeout_secs: env_parse("REASONING_ROUTER_TIMEOUT_SECS", 8u64)?,
        };

        if config.rag_top_k == 0 {
            return Err(anyhow!("RAG_TOP_K must be at least 1"));
        }
        if config.rag_top_k_max < config.rag_top_k {
            return Err(anyhow!(
                "RAG_TOP_K_MAX ({}) must be >= RAG_TOP_K ({})",
                config.rag_top_k_max,
                config.rag_top_k
            ));
        }
        if !(0.0..=1.0).contains(&config.rag_expand_ratio) {
            return Err(anyhow!("RAG_EXPAND_RATIO must be between 0 and 1"));
        }

        Ok(config)
    }
}
