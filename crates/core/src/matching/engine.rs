use crate::config::ScoringConfig;
use crate::domain::product::ProductRecord;
use crate::domain::profile::ProfileSignals;
use crate::errors::DomainError;

use super::scoring::ScoreCalculator;
use super::types::{Evaluation, MatchCandidate};

/// Deterministic four-layer scorer. Scores every record in the pool once;
/// Layer 1 only marks eligibility so the caller can fall back to the full
/// pool when nothing passes.
pub struct ScoringEngine {
    calculator: ScoreCalculator,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { calculator: ScoreCalculator::new(config) }
    }

    pub fn evaluate(
        &self,
        signals: &ProfileSignals,
        pool: &[ProductRecord],
    ) -> Result<Evaluation, DomainError> {
        let mut candidates = Vec::with_capacity(pool.len());
        for record in pool {
            candidates.push(self.score(signals, record)?);
        }
        Ok(Evaluation { candidates })
    }

    fn score(
        &self,
        signals: &ProfileSignals,
        record: &ProductRecord,
    ) -> Result<MatchCandidate, DomainError> {
        let layer2_score = self.calculator.need_match(signals, record);
        let layer3_score = self.calculator.preference_match(signals, record);
        let layer4_score = self.calculator.value_match(signals, record);
        let composite_score = (layer2_score + layer3_score + layer4_score).max(0.0);

        if !composite_score.is_finite() {
            return Err(DomainError::ScoringInvariant(format!(
                "non-finite composite for `{}`",
                record.id.as_str()
            )));
        }

        Ok(MatchCandidate {
            product_id: record.id.clone(),
            layer2_score,
            layer3_score,
            layer4_score,
            composite_score,
            passed_hard_filter: self.calculator.passes_hard_filter(signals, record),
        })
    }
}
