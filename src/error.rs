use thiserror::Error;

/// Error taxonomy for the extraction and classification core.
///
/// Most failures are folded into structured result fields instead of being
/// propagated; the variants here cover the cases where a typed error is the
/// right boundary (configuration errors, degraded-path diagnostics).
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No OCR backend is compiled in or configured. Raised lazily, only when
    /// recognition is actually required for a page.
    #[error("no OCR backend available: {details}")]
    EngineUnavailable { details: String },

    /// File extension is not recognized and the content is not plausible as
    /// plain text. Callers receive this as a failure result, never a panic.
    #[error("unsupported format: .{extension}")]
    UnsupportedFormat { extension: String },

    /// A single page's recognition attempt failed. Recorded on the page,
    /// never aborts the document. The orchestrator knows the page index;
    /// the message carries only the engine diagnostics.
    #[error("recognition failed: {details}")]
    RecognitionFailure { details: String },

    /// Reference corpus missing, unreadable, or empty after filtering.
    #[error("classification corpus could not be loaded: {details}")]
    CorpusLoad { details: String },

    /// LLM tier router unreachable or misconfigured. Classification falls
    /// back to heuristics; this is logged, never surfaced to callers.
    #[error("tier router unavailable: {details}")]
    RouterUnavailable { details: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
