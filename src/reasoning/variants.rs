//! Concrete model selection for a resolved tier.

use tracing::debug;

use crate::models::{AccessScope, ModelVariant, ReasoningTier};

/// Pick the model that should serve `tier`.
///
/// Candidates are variants matching the tier that the caller's scope may
/// use; those sharing the current model's family are preferred, ties broken
/// by sort order then name. When nothing matches the tier the selection
/// falls back to the current model, then to any selectable default.
pub fn select_variant<'a>(
    tier: ReasoningTier,
    current_model: Option<&str>,
    variants: &'a [ModelVariant],
    caller: AccessScope,
) -> Option<&'a ModelVariant> {
    let current_family = current_model
        .and_then(|name| variants.iter().find(|v| v.name == name))
        .map(|v| v.family.as_str());

    let mut candidates: Vec<&ModelVariant> = variants
        .iter()
        .filter(|v| v.tier == tier && v.is_selectable(caller))
        .collect();
    candidates.sort_by(|a, b| {
        let a_same_family = Some(a.family.as_str()) == current_family;
        let b_same_family = Some(b.family.as_str()) == current_family;
        b_same_family
            .cmp(&a_same_family)
            .then(a.sort_order.cmp(&b.sort_order))
            .then(a.name.cmp(&b.name))
    });

    if let Some(best) = candidates.first() {
        debug!("Selected model '{}' for tier {}", best.name, tier.as_str());
        return Some(best);
    }

    // No variant serves this tier: keep the current model if it is usable
    if let Some(current) = current_model
        .and_then(|name| variants.iter().find(|v| v.name == name))
        .filter(|v| v.is_selectable(caller))
    {
        debug!("No variant for tier {}, keeping '{}'", tier.as_str(), current.name);
        return Some(current);
    }

    variants
        .iter()
        .find(|v| v.is_default && v.is_selectable(caller))
}
