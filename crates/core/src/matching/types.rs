use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

/// One scored product. Layer scores are kept separately so explanations and
/// debugging tools can show where a composite came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub product_id: ProductId,
    pub layer2_score: f64,
    pub layer3_score: f64,
    pub layer4_score: f64,
    /// `max(0, layer2 + layer3 + layer4)`.
    pub composite_score: f64,
    pub passed_hard_filter: bool,
}

/// Outcome of scoring one candidate pool. Every candidate is scored exactly
/// once; the hard filter only marks eligibility. Whether to relax to the
/// full pool is the caller's decision, so the engine stays pure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub candidates: Vec<MatchCandidate>,
}

impl Evaluation {
    pub fn eligible(&self) -> Vec<MatchCandidate> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.passed_hard_filter)
            .cloned()
            .collect()
    }

    pub fn full_pool(&self) -> Vec<MatchCandidate> {
        self.candidates.clone()
    }
}

/// Final ranked recommendation set handed to interfaces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub candidates: Vec<MatchCandidate>,
    /// True when the hard filter eliminated every candidate and the result
    /// was drawn from the unfiltered pool instead.
    pub relaxed: bool,
}
