use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vanban::config::Config;
use vanban::extract::{extract_structured, ExtractLimits};
use vanban::ocr::DocumentExtractor;
use vanban::reasoning::{RouterClient, TierClassifier, TierRouter};
use vanban::retrieval::{self, Corpus, RankingOptions};

#[derive(Parser)]
#[command(name = "vanban", about = "Vietnamese document extraction and classification", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract text from a document (PDF, image, or office format)
    Extract {
        /// Input file
        file: PathBuf,
        /// Emit the full result as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Rank a document against the reference corpus and vote on labels
    Classify {
        /// Input file
        file: PathBuf,
        /// Number of neighbors to retrieve (defaults to RAG_TOP_K)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Resolve the reasoning tier for a prompt
    Tier {
        /// The prompt text
        prompt: String,
        /// Number of attached documents
        #[arg(long, default_value_t = 0)]
        attachments: usize,
    },
}

const OCR_INPUT_EXTENSIONS: &[&str] =
    &["pdf", "png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Extract { file, json } => {
            let text = extract_any(&config, &file, json)?;
            println!("{}", text);
        }
        Command::Classify { file, top_k } => {
            let corpus_path = config
                .rag_corpus_path
                .clone()
                .ok_or_else(|| anyhow!("RAG_CORPUS_PATH is not set"))?;
            let corpus = Corpus::load(
                std::path::Path::new(&corpus_path),
                config.rag_min_content_chars,
            )?;
            info!("Corpus loaded: {} records", corpus.len());

            let text = extract_any(&config, &file, false)?;
            let opts = RankingOptions {
                top_k: top_k.unwrap_or(config.rag_top_k),
                top_k_max: config.rag_top_k_max,
                expand_ratio: config.rag_expand_ratio,
                min_score: config.rag_min_score,
                dedup_jaccard: config.rag_dedup_jaccard,
            };
            let ranked = retrieval::rank(&corpus.records, &text, &opts);
            if ranked.is_empty() {
                println!("Không tìm thấy tài liệu tương tự trong corpus.");
                return Ok(());
            }

            println!("{}", retrieval::format_block(&ranked, 200));
            println!("\nĐề xuất hành động:");
            for vote in retrieval::vote_labels(&ranked, None, 0.1) {
                println!(
                    "  {:.2}  {}  (từ hạng {:?})",
                    vote.score, vote.label, vote.voters
                );
            }
        }
        Command::Tier {
            prompt,
            attachments,
        } => {
            let classifier = TierClassifier::new(config.reasoning_length_threshold)?;
            let router: Option<RouterClient> = match (&config.router_url, config.auto_tier_enabled)
            {
                (Some(url), true) => {
                    Some(RouterClient::new(url, &config.router_model, config.router_timeout_secs)?)
                }
                _ => None,
            };
            let tier = classifier.resolve(
                &prompt,
                attachments,
                router.as_ref().map(|r| r as &dyn TierRouter),
            );
            println!("{}", tier.as_str());
        }
    }
    Ok(())
}

/// Route a file to the OCR pipeline or the structured extractor by
/// extension, returning its text.
fn extract_any(config: &Config, file: &PathBuf, json: bool) -> Result<String> {
    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if OCR_INPUT_EXTENSIONS.contains(&extension.as_str()) {
        let extractor = DocumentExtractor::new(config.clone())?;
        let result = extractor.extract_path(file);
        if !result.ok {
            return Err(anyhow!(
                "extraction failed: {}",
                result.error.as_deref().unwrap_or("unknown")
            ));
        }
        info!(
            "Extracted {} pages ({} via OCR, cache_hit={})",
            result.total_pages, result.ocr_pages, result.cache_hit
        );
        if json {
            return Ok(serde_json::to_string_pretty(&result)?);
        }
        Ok(result.text)
    } else {
        let result = extract_structured(file, &ExtractLimits::default());
        if !result.ok {
            return Err(anyhow!(
                "extraction failed: {}",
                result.note.as_deref().unwrap_or("unknown")
            ));
        }
        if json {
            return Ok(serde_json::to_string_pretty(&result)?);
        }
        Ok(result.text)
    }
}
