//! Four-layer match pipeline: hard filter, need match, preference match,
//! value match, then ranking.

pub mod engine;
pub mod ranker;
pub mod scoring;
pub mod types;

pub use engine::ScoringEngine;
pub use ranker::ResultRanker;
pub use types::{Evaluation, MatchCandidate, RecommendationResult};
