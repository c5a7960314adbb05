use std::collections::HashMap;

use tokio::sync::RwLock;

use covermatch_core::{ProductId, ProductRecord};

use crate::{company_matches, CandidateIndex, CoarseFilters, IndexError};

/// Catalog held entirely in memory. Used by tests and the single-process
/// CLI paths.
#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<HashMap<String, ProductRecord>>,
}

#[async_trait::async_trait]
impl CandidateIndex for InMemoryIndex {
    async fn query(&self, filters: &CoarseFilters) -> Result<Vec<ProductRecord>, IndexError> {
        let records = self.records.read().await;
        let mut matched: Vec<ProductRecord> = records
            .values()
            .filter(|record| {
                filters.age.map_or(true, |age| record.eligibility.age_range.contains(age))
                    && company_matches(filters, &record.company)
            })
            .cloned()
            .collect();
        matched.sort_by(|left, right| left.id.cmp(&right.id));
        if let Some(limit) = filters.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn get_by_ids(&self, ids: &[ProductId]) -> Result<Vec<ProductRecord>, IndexError> {
        let records = self.records.read().await;
        Ok(ids.iter().filter_map(|id| records.get(id.as_str()).cloned()).collect())
    }

    async fn upsert(&self, record: ProductRecord) -> Result<(), IndexError> {
        let mut records = self.records.write().await;
        records.insert(record.id.as_str().to_string(), record);
        Ok(())
    }
}
