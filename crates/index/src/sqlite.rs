use sqlx::Row;

use covermatch_core::{ProductId, ProductRecord};

use crate::{company_matches, CandidateIndex, CoarseFilters, DbPool, IndexError};

/// SQLite-backed catalog. The canonical record travels as a JSON column;
/// only the coarse query columns are relational.
pub struct SqlProductIndex {
    pool: DbPool,
}

impl SqlProductIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<ProductRecord, IndexError> {
        let raw: String = row.get("record");
        serde_json::from_str(&raw).map_err(|error| IndexError::Decode(error.to_string()))
    }
}

#[async_trait::async_trait]
impl CandidateIndex for SqlProductIndex {
    async fn query(&self, filters: &CoarseFilters) -> Result<Vec<ProductRecord>, IndexError> {
        let rows = sqlx::query(
            "SELECT record FROM product_records \
             WHERE (?1 IS NULL OR (min_age <= ?1 AND max_age >= ?1)) \
             ORDER BY id",
        )
        .bind(filters.age.map(i64::from))
        .fetch_all(&self.pool)
        .await?;

        // Company matching is a loose containment check, so it happens here
        // rather than in SQL; the age columns already cut the bulk.
        let mut matched = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = Self::decode(row)?;
            if company_matches(filters, &record.company) {
                matched.push(record);
            }
        }
        if let Some(limit) = filters.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn get_by_ids(&self, ids: &[ProductId]) -> Result<Vec<ProductRecord>, IndexError> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query("SELECT record FROM product_records WHERE id = ?1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
            if let Some(row) = row {
                records.push(Self::decode(&row)?);
            }
        }
        Ok(records)
    }

    async fn upsert(&self, record: ProductRecord) -> Result<(), IndexError> {
        let payload = serde_json::to_string(&record)
            .map_err(|error| IndexError::Decode(error.to_string()))?;
        sqlx::query(
            "INSERT INTO product_records (id, company, min_age, max_age, record) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (id) DO UPDATE SET \
               company = excluded.company, \
               min_age = excluded.min_age, \
               max_age = excluded.max_age, \
               record = excluded.record",
        )
        .bind(record.id.as_str())
        .bind(&record.company)
        .bind(i64::from(record.eligibility.age_range.min))
        .bind(i64::from(record.eligibility.age_range.max))
        .bind(&payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
