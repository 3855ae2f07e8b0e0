pub mod cache;
pub mod engine;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod quality;

pub use cache::{content_key, ExtractionCache};
pub use engine::{BackendPolicy, OcrAdapter, OcrEngineKind, OcrOutcome, OcrSettings};
pub use pipeline::{assemble_pages, DocumentExtractor};
pub use postprocess::{PostProcessOptions, PostProcessor};
