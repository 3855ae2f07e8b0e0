pub mod router;
pub mod tier;
pub mod variants;

pub use router::{RouterClient, TierRouter};
pub use tier::{system_prompt_for, TierClassifier};
pub use variants::select_variant;

use crate::models::{AccessScope, ModelVariant, ReasoningTierDecision};

/// Resolve a tier and pick a model for it in one step.
pub fn decide(
    classifier: &TierClassifier,
    prompt: &str,
    attachments: usize,
    router: Option<&dyn TierRouter>,
    current_model: Option<&str>,
    variants: &[ModelVariant],
    caller: AccessScope,
) -> ReasoningTierDecision {
    let tier = classifier.resolve(prompt, attachments, router);
    let model = select_variant(tier, current_model, variants, caller)
        .map(|v| v.name.clone())
        .or_else(|| current_model.map(|m| m.to_string()))
        .unwrap_or_default();
    ReasoningTierDecision {
        tier,
        model,
        system_prompt: system_prompt_for(tier).to_string(),
    }
}
