pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod prompt;
pub mod reasoning;
pub mod retrieval;

pub use config::Config;
pub use error::ExtractError;
