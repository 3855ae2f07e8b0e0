use serde::{Deserialize, Serialize};

/// Discrete reasoning effort tier. "auto" is a request state handled by the
/// classifier; it is never an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningTier {
    Low,
    Medium,
    High,
}

impl ReasoningTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningTier::Low => "low",
            ReasoningTier::Medium => "medium",
            ReasoningTier::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(ReasoningTier::Low),
            "medium" => Some(ReasoningTier::Medium),
            "high" => Some(ReasoningTier::High),
            _ => None,
        }
    }
}

/// Who may use a model variant. Hierarchical: everything visible to "all" is
/// visible to "user", and so on up to "admin".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
    All,
    User,
    Internal,
    Admin,
}

impl AccessScope {
    fn rank(&self) -> u8 {
        match self {
            AccessScope::All => 0,
            AccessScope::User => 1,
            AccessScope::Internal => 2,
            AccessScope::Admin => 3,
        }
    }

    /// Whether a caller with this scope may use a variant requiring `required`.
    pub fn allows(&self, required: AccessScope) -> bool {
        self.rank() >= required.rank()
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" => Some(AccessScope::All),
            "user" => Some(AccessScope::User),
            "internal" => Some(AccessScope::Internal),
            "admin" => Some(AccessScope::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    Active,
    Preview,
    Deprecated,
}

/// One concrete model endpoint that can serve a resolved tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVariant {
    pub name: String,
    pub provider: String,
    /// Family identifier used for same-family preference (provider/base name)
    pub family: String,
    pub tier: ReasoningTier,
    pub enabled: bool,
    pub status: VariantStatus,
    pub required_scope: AccessScope,
    pub sort_order: i32,
    pub is_default: bool,
}

impl ModelVariant {
    pub fn is_selectable(&self, caller: AccessScope) -> bool {
        self.enabled
            && matches!(self.status, VariantStatus::Active | VariantStatus::Preview)
            && caller.allows(self.required_scope)
    }
}

/// Outcome of the tier router: resolved tier, the model chosen to serve it,
/// and the system-prompt framing for that tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTierDecision {
    pub tier: ReasoningTier,
    pub model: String,
    pub system_prompt: String,
}
