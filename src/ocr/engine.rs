//! Uniform adapter over the two recognition engines: classical (tesseract)
//! and neural (PaddleOCR ONNX models). Handles engine selection, low-yield
//! cross-engine retry, and garble-driven re-attempts.

use anyhow::{anyhow, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::ocr::preprocess::{self, UpscaleOptions};
use crate::ocr::quality;

#[cfg(feature = "neural-ocr")]
use paddle_ocr_rs::ocr_lite::OcrLite;
#[cfg(feature = "neural-ocr")]
use std::collections::HashMap;

/// Explicit backend selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPolicy {
    Auto,
    ForceClassical,
    ForceNeural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    Classical,
    Neural,
}

impl OcrEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrEngineKind::Classical => "tesseract",
            OcrEngineKind::Neural => "paddle",
        }
    }

    fn other(&self) -> OcrEngineKind {
        match self {
            OcrEngineKind::Classical => OcrEngineKind::Neural,
            OcrEngineKind::Neural => OcrEngineKind::Classical,
        }
    }
}

/// Result of recognizing one page image.
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    pub text: String,
    /// 0..1 when the engine reports one
    pub confidence: Option<f32>,
    pub engine: OcrEngineKind,
}

/// Adapter configuration, usually derived from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub upscale: UpscaleOptions,
    /// Hardware acceleration available for the neural engine
    pub neural_accel: bool,
    pub paddle_model_dir: Option<String>,
    /// Below this many chars the primary result is considered low-yield and
    /// the other engine is tried
    pub min_primary_chars: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            upscale: UpscaleOptions::default(),
            neural_accel: false,
            paddle_model_dir: None,
            min_primary_chars: 20,
        }
    }
}

/// Recognition adapter. Owns the lazily-initialized neural engine handles,
/// keyed by (language, acceleration flag); handles are reused across calls.
/// Not safe for concurrent calls into the same handle without the internal
/// lock, which is why the cache lives behind a mutex here.
pub struct OcrAdapter {
    settings: OcrSettings,
    #[cfg(feature = "neural-ocr")]
    neural_handles: Mutex<HashMap<(String, bool), OcrLite>>,
    #[cfg(not(feature = "neural-ocr"))]
    _unused: Mutex<()>,
}

impl OcrAdapter {
    pub fn new(settings: OcrSettings) -> Self {
        Self {
            settings,
            #[cfg(feature = "neural-ocr")]
            neural_handles: Mutex::new(HashMap::new()),
            #[cfg(not(feature = "neural-ocr"))]
            _unused: Mutex::new(()),
        }
    }

    /// Engines that are compiled in and configured.
    pub fn available_engines(&self) -> Vec<OcrEngineKind> {
        let mut engines = Vec::new();
        if cfg!(feature = "ocr") {
            engines.push(OcrEngineKind::Classical);
        }
        if cfg!(feature = "neural-ocr") && self.settings.paddle_model_dir.is_some() {
            engines.push(OcrEngineKind::Neural);
        }
        engines
    }

    /// Recognize one page image. Applies adaptive upscaling, picks the
    /// primary engine per the policy, retries the alternate engine on
    /// low-yield or garbled output, and keeps the better candidate.
    pub fn recognize(
        &self,
        image: &DynamicImage,
        lang: &str,
        policy: BackendPolicy,
    ) -> Result<OcrOutcome, ExtractError> {
        let available = self.available_engines();
        if available.is_empty() {
            return Err(ExtractError::EngineUnavailable {
                details: "neither the classical nor the neural engine is compiled in and configured"
                    .to_string(),
            });
        }

        let order: Vec<OcrEngineKind> = match policy {
            BackendPolicy::ForceClassical => vec![OcrEngineKind::Classical],
            BackendPolicy::ForceNeural => vec![OcrEngineKind::Neural],
            BackendPolicy::Auto => {
                let primary = if self.settings.neural_accel
                    && available.contains(&OcrEngineKind::Neural)
                {
                    OcrEngineKind::Neural
                } else if available.contains(&OcrEngineKind::Classical) {
                    OcrEngineKind::Classical
                } else {
                    OcrEngineKind::Neural
                };
                vec![primary, primary.other()]
            }
        };
        let order: Vec<OcrEngineKind> = order
            .into_iter()
            .filter(|kind| available.contains(kind))
            .collect();
        if order.is_empty() {
            return Err(ExtractError::EngineUnavailable {
                details: "forced backend is not compiled in or configured".to_string(),
            });
        }

        let image = preprocess::upscale_if_small(image.clone(), &self.settings.upscale);

        let primary = self
            .recognize_with(order[0], &image, lang)
            .map_err(|e| ExtractError::RecognitionFailure {
                details: e.to_string(),
            });

        let mut best = match primary {
            Ok(outcome) => outcome,
            Err(err) => {
                // Primary engine blew up; the alternate is the only hope
                if let Some(&fallback) = order.get(1) {
                    warn!("Primary OCR engine failed ({}), trying {}", err, fallback.as_str());
                    return self
                        .recognize_with(fallback, &image, lang)
                        .map_err(|e| ExtractError::RecognitionFailure {
                            details: e.to_string(),
                        });
                }
                return Err(err);
            }
        };

        if let Some(&fallback) = order.get(1) {
            if best.text.trim().chars().count() < self.settings.min_primary_chars {
                debug!(
                    "Low-yield result from {} ({} chars), retrying with {}",
                    best.engine.as_str(),
                    best.text.trim().chars().count(),
                    fallback.as_str()
                );
                if let Ok(alternate) = self.recognize_with(fallback, &image, lang) {
                    if alternate.text.trim().chars().count() > best.text.trim().chars().count() {
                        best = alternate;
                    }
                }
            } else if quality::looks_garbled(&best.text) {
                info!(
                    "Garbled output signature from {}, re-attempting with {}",
                    best.engine.as_str(),
                    fallback.as_str()
                );
                if let Ok(alternate) = self.recognize_with(fallback, &image, lang) {
                    if quality::quality_score(&alternate.text) > quality::quality_score(&best.text) {
                        best = alternate;
                    }
                }
            }
        }

        Ok(best)
    }

    fn recognize_with(
        &self,
        kind: OcrEngineKind,
        image: &DynamicImage,
        lang: &str,
    ) -> Result<OcrOutcome> {
        match kind {
            OcrEngineKind::Classical => self.recognize_classical(image, lang),
            OcrEngineKind::Neural => self.recognize_neural(image, lang),
        }
    }

    #[cfg(feature = "ocr")]
    fn recognize_classical(&self, image: &DynamicImage, lang: &str) -> Result<OcrOutcome> {
        use tesseract::Tesseract;

        let prepared = preprocess::prepare_for_classical(image);
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(prepared)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;

        let mut engine = Tesseract::new(None, Some(lang))
            .map_err(|e| anyhow!("tesseract init failed: {}", e))?
            .set_image_from_mem(&png)
            .map_err(|e| anyhow!("tesseract set_image failed: {}", e))?;

        let text = engine
            .get_text()
            .map_err(|e| anyhow!("tesseract recognition failed: {}", e))?;

        let mean_conf = engine.mean_text_conf();
        let confidence = if mean_conf > 0 {
            Some((mean_conf as f32 / 100.0).clamp(0.0, 1.0))
        } else {
            None
        };

        Ok(OcrOutcome {
            text: text.trim().to_string(),
            confidence,
            engine: OcrEngineKind::Classical,
        })
    }

    #[cfg(not(feature = "ocr"))]
    fn recognize_classical(&self, _image: &DynamicImage, _lang: &str) -> Result<OcrOutcome> {
        Err(anyhow!("classical engine not compiled in (enable the `ocr` feature)"))
    }

    #[cfg(feature = "neural-ocr")]
    fn recognize_neural(&self, image: &DynamicImage, lang: &str) -> Result<OcrOutcome> {
        const PADDING: u32 = 50;
        const BOX_SCORE_THRESH: f32 = 0.5;
        const BOX_THRESH: f32 = 0.3;
        const UNCLIP_RATIO: f32 = 1.6;

        let model_dir = self
            .settings
            .paddle_model_dir
            .as_deref()
            .ok_or_else(|| anyhow!("OCR_PADDLE_MODEL_DIR is not set"))?;

        let key = (lang.to_string(), self.settings.neural_accel);
        let mut handles = match self.neural_handles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Neural engine cache mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        if !handles.contains_key(&key) {
            let mut engine = OcrLite::new();
            let det = format!("{}/ch_PP-OCRv4_det_infer.onnx", model_dir);
            let cls = format!("{}/ch_ppocr_mobile_v2.0_cls_infer.onnx", model_dir);
            let rec = format!("{}/ch_PP-OCRv4_rec_infer.onnx", model_dir);
            let threads = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1) as u32;
            engine
                .init_models(&det, &cls, &rec, threads as usize)
                .map_err(|e| anyhow!("paddle model init failed: {}", e))?;
            info!("Initialized neural OCR engine (lang={}, accel={})", lang, key.1);
            handles.insert(key.clone(), engine);
        }

        let engine = handles
            .get_mut(&key)
            .ok_or_else(|| anyhow!("neural engine cache unavailable"))?;

        let rgb = image.to_rgb8();
        let max_side = rgb.width().max(rgb.height()).clamp(1024, 3072);
        let detected = engine
            .detect(
                &rgb,
                PADDING,
                max_side,
                BOX_SCORE_THRESH,
                BOX_THRESH,
                UNCLIP_RATIO,
                true,
                false,
            )
            .map_err(|e| anyhow!("paddle detect failed: {}", e))?;

        let mut lines = Vec::new();
        let mut score_sum = 0.0f32;
        let mut score_count = 0usize;
        for block in detected.text_blocks {
            let line = block.text.trim().to_string();
            if line.is_empty() {
                continue;
            }
            score_sum += block.box_score;
            score_count += 1;
            lines.push(line);
        }

        let confidence = if score_count > 0 {
            Some((score_sum / score_count as f32).clamp(0.0, 1.0))
        } else {
            None
        };

        Ok(OcrOutcome {
            text: lines.join("\n"),
            confidence,
            engine: OcrEngineKind::Neural,
        })
    }

    #[cfg(not(feature = "neural-ocr"))]
    fn recognize_neural(&self, _image: &DynamicImage, _lang: &str) -> Result<OcrOutcome> {
        Err(anyhow!(
            "neural engine not compiled in (enable the `neural-ocr` feature)"
        ))
    }
}
