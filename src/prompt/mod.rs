//! Final prompt assembly: tier framing, retrieved context, and attached
//! document text combined into one model input.

use tracing::debug;

use crate::retrieval::truncate_at_boundary;

/// One attached document's extracted text, with the name shown to the
/// model.
#[derive(Debug, Clone)]
pub struct AttachedDocument {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ComposerOptions {
    /// Char budget per attached document
    pub max_document_chars: usize,
    /// Minimum length before transcript de-duplication applies; tiny texts
    /// match incidentally
    pub dedup_min_chars: usize,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            max_document_chars: 12_000,
            dedup_min_chars: 80,
        }
    }
}

pub struct PromptComposer {
    opts: ComposerOptions,
}

impl PromptComposer {
    pub fn new(opts: ComposerOptions) -> Self {
        Self { opts }
    }

    /// Build the full model input. Document text already present verbatim
    /// in the transcript is suppressed so the model never sees the same
    /// content twice; remaining documents are length-capped with
    /// boundary-aware truncation.
    pub fn compose(
        &self,
        tier_system_prompt: &str,
        rag_block: &str,
        documents: &[AttachedDocument],
        transcript: &str,
        user_message: &str,
    ) -> String {
        let mut sections: Vec<String> = Vec::new();
        if !tier_system_prompt.trim().is_empty() {
            sections.push(tier_system_prompt.trim().to_string());
        }
        if !rag_block.trim().is_empty() {
            sections.push(rag_block.trim().to_string());
        }

        for document in documents {
            let text = document.text.trim();
            if text.is_empty() {
                continue;
            }
            if text.chars().count() >= self.opts.dedup_min_chars && transcript.contains(text) {
                debug!(
                    "Document '{}' already present in transcript, suppressing",
                    document.name
                );
                continue;
            }
            sections.push(format!(
                "Nội dung tệp đính kèm \"{}\":\n{}",
                document.name,
                truncate_at_boundary(text, self.opts.max_document_chars)
            ));
        }

        if !user_message.trim().is_empty() {
            sections.push(user_message.trim().to_string());
        }
        sections.join("\n\n")
    }
}
