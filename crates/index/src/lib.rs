//! Product catalog index.
//!
//! The index answers a deliberately coarse first-pass query; precise
//! eligibility is always re-checked by the scoring engine's hard filter, so
//! implementations are free to over-include.

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use covermatch_core::{ProductId, ProductRecord};

pub use connection::{connect, connect_read_only, connect_with_settings, DbPool};
pub use memory::InMemoryIndex;
pub use sqlite::SqlProductIndex;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Coarse pre-filter for the first-pass candidate query. Every field is
/// optional; an empty filter returns the whole catalog (up to `limit`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoarseFilters {
    /// Keep products whose eligible age range covers this age.
    pub age: Option<u32>,
    /// Keep products issued by any of these companies (loose match).
    pub companies: Vec<String>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait CandidateIndex: Send + Sync {
    /// First-pass candidate retrieval. Results are ordered by product id so
    /// retrieval stays reproducible.
    async fn query(&self, filters: &CoarseFilters) -> Result<Vec<ProductRecord>, IndexError>;

    /// Bulk lookup preserving the order of the requested ids; missing ids
    /// are skipped.
    async fn get_by_ids(&self, ids: &[ProductId]) -> Result<Vec<ProductRecord>, IndexError>;

    /// Insert or fully replace the record with the same id.
    async fn upsert(&self, record: ProductRecord) -> Result<(), IndexError>;
}

pub(crate) fn company_matches(filters: &CoarseFilters, company: &str) -> bool {
    if filters.companies.is_empty() {
        return true;
    }
    let company = company.to_lowercase();
    filters.companies.iter().any(|wanted| {
        let wanted = wanted.trim().to_lowercase();
        !wanted.is_empty() && (company == wanted || company.contains(&wanted))
    })
}
