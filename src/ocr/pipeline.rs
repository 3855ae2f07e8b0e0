//! Document extraction orchestrator: per-page native-text vs. OCR routing
//! for PDFs, single-page OCR for plain images, page assembly with offset
//! bookkeeping, and cache integration.

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ExtractError;
use crate::models::{ExtractionResult, PageInfo, PageSource};
use crate::ocr::cache::{content_key, ExtractionCache};
use crate::ocr::engine::{OcrAdapter, OcrSettings};
use crate::ocr::postprocess::{PostProcessOptions, PostProcessor};
use crate::ocr::quality;

/// One page's raw processing outcome, before assembly.
struct PageOutcome {
    text: String,
    info: PageInfo,
}

pub struct DocumentExtractor {
    config: Config,
    adapter: OcrAdapter,
    post: PostProcessor,
    cache: ExtractionCache,
}

impl DocumentExtractor {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let adapter = OcrAdapter::new(OcrSettings {
            upscale: config.upscale.clone(),
            neural_accel: config.neural_accel,
            paddle_model_dir: config.paddle_model_dir.clone(),
            min_primary_chars: 20,
        });
        let mut post = PostProcessor::new(config.postprocess.clone())?;
        if let Some(path) = &config.corrections_path {
            post = post.with_corrections(Path::new(path))?;
        }
        let cache = ExtractionCache::new(&config.cache_dir, config.cache_enabled);
        Ok(Self {
            config,
            adapter,
            post,
            cache,
        })
    }

    /// Build an extractor with non-default cleanup options, for callers
    /// that post-process differently per request.
    pub fn with_postprocess(mut self, opts: PostProcessOptions) -> anyhow::Result<Self> {
        self.post = PostProcessor::new(opts)?;
        Ok(self)
    }

    /// Extract text from a PDF or image file. Total: every failure mode is
    /// reported through the result's `ok`/`error` fields, never a panic.
    pub fn extract_path(&self, path: &Path) -> ExtractionResult {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("Failed to read {}: {}", path.display(), err);
                return ExtractionResult::failure(format!(
                    "cannot read {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let key = content_key(&bytes);
        if let Some(cached) = self.cache.load(&key) {
            info!("Cache hit for {} ({} pages)", path.display(), cached.total_pages);
            return cached;
        }

        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let result = if extension == "pdf" {
            self.extract_pdf(&bytes)
        } else if mime.type_() == mime_guess::mime::IMAGE {
            self.extract_image(&bytes)
        } else {
            ExtractionResult::failure(
                ExtractError::UnsupportedFormat { extension }.to_string(),
            )
        };

        self.cache.store(&key, &result);
        result
    }

    fn extract_pdf(&self, bytes: &[u8]) -> ExtractionResult {
        let pdfium = match Pdfium::bind_to_system_library() {
            Ok(bindings) => Pdfium::new(bindings),
            Err(err) => {
                return ExtractionResult::failure(format!("pdfium unavailable: {}", err))
            }
        };
        let document = match pdfium.load_pdf_from_byte_slice(bytes, None) {
            Ok(doc) => doc,
            Err(err) => return ExtractionResult::failure(format!("invalid PDF: {}", err)),
        };

        let page_count = document.pages().len() as usize;
        let limit = page_count.min(self.config.ocr_max_pages);
        if limit < page_count {
            warn!(
                "Document has {} pages, processing only the first {}",
                page_count, limit
            );
        }

        let mut outcomes = Vec::with_capacity(limit);
        for (index, page) in document.pages().iter().enumerate().take(limit) {
            outcomes.push(self.process_pdf_page(index, &page));
        }
        self.finish(outcomes)
    }

    fn process_pdf_page(&self, index: usize, page: &PdfPage) -> PageOutcome {
        let started = Instant::now();

        // Native text fast path
        if !self.config.force_ocr {
            if let Ok(text_page) = page.text() {
                let native = text_page.all();
                if native.trim().chars().count() >= self.config.native_text_min_chars {
                    let cleaned = self.post.process_page(&native);
                    debug!("Page {}: native text ({} chars)", index, cleaned.chars().count());
                    return PageOutcome {
                        info: PageInfo {
                            index,
                            source: PageSource::PdfText,
                            chars: cleaned.chars().count(),
                            duration_ms: started.elapsed().as_millis() as u64,
                            dpi: None,
                            confidence: None,
                            note: None,
                        },
                        text: cleaned,
                    };
                }
            }
        }

        // Rasterize and recognize
        let dpi = self.effective_dpi(page, self.config.ocr_min_dpi);
        let recognized = self
            .render_page(page, dpi)
            .and_then(|image| {
                self.adapter
                    .recognize(&image, &self.config.ocr_pdf_lang, self.config.ocr_backend)
                    .map_err(|e| e.to_string())
            });

        let mut recognized = match recognized {
            Ok(outcome) => outcome,
            Err(details) => {
                warn!("Page {}: recognition failed: {}", index, details);
                return PageOutcome {
                    info: PageInfo {
                        index,
                        source: PageSource::Error,
                        chars: 0,
                        duration_ms: started.elapsed().as_millis() as u64,
                        dpi: Some(dpi),
                        confidence: None,
                        note: Some(details),
                    },
                    text: String::new(),
                };
            }
        };

        // Garbled output: one re-rasterization at higher resolution, keep
        // whichever candidate scores better
        let mut used_dpi = dpi;
        if quality::looks_garbled(&recognized.text) {
            let retry_dpi = self.effective_dpi(page, dpi + dpi / 2);
            if retry_dpi > dpi {
                info!("Page {}: garbled at {} dpi, retrying at {} dpi", index, dpi, retry_dpi);
                if let Ok(image) = self.render_page(page, retry_dpi) {
                    if let Ok(retry) = self.adapter.recognize(
                        &image,
                        &self.config.ocr_pdf_lang,
                        self.config.ocr_backend,
                    ) {
                        if quality::quality_score(&retry.text)
                            > quality::quality_score(&recognized.text)
                        {
                            recognized = retry;
                            used_dpi = retry_dpi;
                        }
                    }
                }
            }
        }

        let cleaned = self.post.process_page(&recognized.text);
        PageOutcome {
            info: PageInfo {
                index,
                source: PageSource::Ocr,
                chars: cleaned.chars().count(),
                duration_ms: started.elapsed().as_millis() as u64,
                dpi: Some(used_dpi),
                confidence: recognized.confidence,
                note: Some(recognized.engine.as_str().to_string()),
            },
            text: cleaned,
        }
    }

    /// Requested DPI clamped so the rendered page stays under the pixel
    /// ceiling.
    fn effective_dpi(&self, page: &PdfPage, requested: u32) -> u32 {
        let width_in = page.width().value / 72.0;
        let height_in = page.height().value / 72.0;
        if width_in <= 0.0 || height_in <= 0.0 {
            return requested;
        }
        let pixels = width_in * height_in * (requested as f32) * (requested as f32);
        if pixels <= self.config.max_render_pixels as f32 {
            return requested;
        }
        let scale = (self.config.max_render_pixels as f32 / pixels).sqrt();
        ((requested as f32) * scale).floor().max(72.0) as u32
    }

    fn render_page(&self, page: &PdfPage, dpi: u32) -> Result<DynamicImage, String> {
        let target_width = (page.width().value / 72.0 * dpi as f32).round().max(1.0) as i32;
        let config = PdfRenderConfig::new().set_target_width(target_width);
        page.render_with_config(&config)
            .map(|rendered| rendered.as_image())
            .map_err(|e| format!("render failed: {}", e))
    }

    fn extract_image(&self, bytes: &[u8]) -> ExtractionResult {
        let started = Instant::now();
        let image = match image::load_from_memory(bytes) {
            Ok(image) => image,
            Err(err) => return ExtractionResult::failure(format!("cannot decode image: {}", err)),
        };

        // Only a missing backend fails the whole document; a recognition
        // failure is recorded as an error page, mirroring the PDF path
        let outcome = match self.adapter.recognize(
            &image,
            &self.config.ocr_image_lang,
            self.config.ocr_backend,
        ) {
            Ok(outcome) => outcome,
            Err(err @ ExtractError::EngineUnavailable { .. }) => {
                return ExtractionResult::failure(err.to_string())
            }
            Err(err) => {
                warn!("Image recognition failed: {}", err);
                return self.finish(vec![PageOutcome {
                    info: PageInfo {
                        index: 0,
                        source: PageSource::Error,
                        chars: 0,
                        duration_ms: started.elapsed().as_millis() as u64,
                        dpi: None,
                        confidence: None,
                        note: Some(err.to_string()),
                    },
                    text: String::new(),
                }]);
            }
        };

        let cleaned = self.post.process_page(&outcome.text);
        let page = PageOutcome {
            info: PageInfo {
                index: 0,
                source: PageSource::ImageOcr,
                chars: cleaned.chars().count(),
                duration_ms: started.elapsed().as_millis() as u64,
                dpi: None,
                confidence: outcome.confidence,
                note: Some(outcome.engine.as_str().to_string()),
            },
            text: cleaned,
        };
        self.finish(vec![page])
    }

    /// Noise suppression, document-wide cleanup, assembly, and metrics.
    fn finish(&self, mut outcomes: Vec<PageOutcome>) -> ExtractionResult {
        if self.config.suppress_noise_pages {
            for outcome in &mut outcomes {
                if matches!(outcome.info.source, PageSource::Ocr | PageSource::ImageOcr)
                    && quality::looks_garbled(&outcome.text)
                {
                    debug!("Page {}: suppressed as scanner noise", outcome.info.index);
                    outcome.text.clear();
                    outcome.info.source = PageSource::Skipped;
                    outcome.info.chars = 0;
                    outcome.info.note = Some("noise-suppressed".to_string());
                }
            }
        }

        let mut page_texts: Vec<String> =
            outcomes.iter().map(|o| o.text.clone()).collect();
        self.post.process_document(&mut page_texts);
        for (outcome, text) in outcomes.iter_mut().zip(&page_texts) {
            outcome.info.chars = text.chars().count();
        }

        let (text, page_spans) = assemble_pages(
            &page_texts,
            &self.config.page_separator,
            self.config.insert_page_headers,
        );

        let pages: Vec<PageInfo> = outcomes.iter().map(|o| o.info.clone()).collect();
        let ocr_pages = pages
            .iter()
            .filter(|p| matches!(p.source, PageSource::Ocr | PageSource::ImageOcr))
            .count();
        let confidences: Vec<f32> = pages.iter().filter_map(|p| p.confidence).collect();
        let avg_confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
        };
        let mut engines_used: Vec<String> = Vec::new();
        for page in &pages {
            if let Some(note) = &page.note {
                if matches!(page.source, PageSource::Ocr | PageSource::ImageOcr)
                    && !engines_used.contains(note)
                {
                    engines_used.push(note.clone());
                }
            }
        }

        ExtractionResult {
            ok: true,
            quality: quality::metrics(&text),
            total_pages: pages.len(),
            ocr_pages,
            engines_used,
            avg_confidence,
            cache_hit: false,
            error: None,
            text,
            page_texts,
            page_spans,
            pages,
        }
    }
}

/// Join page texts with the configured separator and compute each page's
/// `[start, end)` char span within the final text. Every page gets exactly
/// one span, empty pages included; separators (and nothing else) fall
/// between spans.
pub fn assemble_pages(
    pages: &[String],
    separator: &str,
    headers: bool,
) -> (String, Vec<(usize, usize)>) {
    let separator_chars = separator.chars().count();
    let mut text = String::new();
    let mut spans = Vec::with_capacity(pages.len());
    let mut offset = 0usize;

    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            text.push_str(separator);
            offset += separator_chars;
        }
        let segment = if headers {
            format!("[Trang {}]\n{}", index + 1, page)
        } else {
            page.clone()
        };
        let chars = segment.chars().count();
        text.push_str(&segment);
        spans.push((offset, offset + chars));
        offset += chars;
    }

    (text, spans)
}
