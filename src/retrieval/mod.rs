pub mod corpus;
pub mod labels;
pub mod ranking;
pub mod tokenize;

pub use corpus::Corpus;
pub use labels::{parse_labels, vote_labels};
pub use ranking::{format_block, rank, truncate_at_boundary, RankingOptions};
