use std::collections::HashMap;
use std::collections::HashSet;

use crate::domain::product::ProductRecord;

use super::types::MatchCandidate;

/// Deduplicates, orders and truncates scored candidates.
///
/// Order: composite descending, then editorial cost-performance descending,
/// then product id ascending so equal products rank reproducibly.
pub struct ResultRanker {
    top_n: usize,
}

impl ResultRanker {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn rank(
        &self,
        candidates: Vec<MatchCandidate>,
        pool: &[ProductRecord],
    ) -> Vec<MatchCandidate> {
        let cost_performance: HashMap<&str, f64> = pool
            .iter()
            .map(|record| (record.id.as_str(), record.quality.cost_performance))
            .collect();

        let mut seen = HashSet::new();
        let mut ranked: Vec<MatchCandidate> = candidates
            .into_iter()
            .filter(|candidate| seen.insert(candidate.product_id.clone()))
            .collect();

        ranked.sort_by(|left, right| {
            right
                .composite_score
                .total_cmp(&left.composite_score)
                .then_with(|| {
                    let left_cp =
                        cost_performance.get(left.product_id.as_str()).copied().unwrap_or(0.0);
                    let right_cp =
                        cost_performance.get(right.product_id.as_str()).copied().unwrap_or(0.0);
                    right_cp.total_cmp(&left_cp)
                })
                .then_with(|| left.product_id.cmp(&right.product_id))
        });
        ranked.truncate(self.top_n);
        ranked
    }
}
