// Re-export all model types for ease of use

pub mod corpus;
pub mod extraction;
pub mod reasoning;

pub use corpus::{LabelVote, RankedCandidate, ReferenceRecord};
pub use extraction::{ExtractionResult, PageInfo, PageSource, QualityMetrics};
pub use reasoning::{
    AccessScope, ModelVariant, ReasoningTier, ReasoningTierDecision, VariantStatus,
};
