//! Batch catalog ingestion: raw JSON records in, canonical records upserted.
//!
//! The batch is resilient end to end: one unparseable field defaults, one
//! bad record is skipped, and the summary reports both.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use covermatch_core::{
    ApplicationError, FeatureNormalizer, IngestReport, NormalizerConfig, RawProductRecord,
    RenewalInterpreter,
};
use covermatch_index::CandidateIndex;

#[derive(Clone, Debug, Default, Serialize)]
pub struct IngestSummary {
    pub total: usize,
    pub upserted: usize,
    pub skipped: usize,
    pub defaulted_fields: usize,
    pub low_quality_renewals: usize,
    pub reports: Vec<IngestReport>,
}

pub struct IngestPipeline {
    normalizer: FeatureNormalizer,
    index: Arc<dyn CandidateIndex>,
    interpreter: Option<Arc<dyn RenewalInterpreter>>,
}

impl IngestPipeline {
    pub fn new(
        config: NormalizerConfig,
        index: Arc<dyn CandidateIndex>,
        interpreter: Option<Arc<dyn RenewalInterpreter>>,
    ) -> Self {
        Self { normalizer: FeatureNormalizer::new(config), index, interpreter }
    }

    /// Read a JSON array of raw records from disk.
    pub async fn load_records(path: &Path) -> Result<Vec<RawProductRecord>, ApplicationError> {
        let payload = tokio::fs::read_to_string(path).await.map_err(|error| {
            ApplicationError::Ingestion(format!("could not read `{}`: {error}", path.display()))
        })?;
        serde_json::from_str(&payload).map_err(|error| {
            ApplicationError::Ingestion(format!("could not parse `{}`: {error}", path.display()))
        })
    }

    pub async fn ingest(&self, raws: &[RawProductRecord]) -> IngestSummary {
        let mut summary = IngestSummary { total: raws.len(), ..IngestSummary::default() };

        for raw in raws {
            if raw.id.trim().is_empty() {
                tracing::warn!(event_name = "ingest.missing_id", name = %raw.name, "skipping record without id");
                summary.skipped += 1;
                continue;
            }

            let interpreter = self.interpreter.as_deref();
            let (record, report) = self.normalizer.normalize(raw, interpreter).await;

            if let Err(error) = record.validate() {
                tracing::warn!(
                    event_name = "ingest.invalid_record",
                    product_id = %raw.id,
                    error = %error,
                    "skipping record that failed canonical validation"
                );
                summary.skipped += 1;
                continue;
            }

            match self.index.upsert(record).await {
                Ok(()) => {
                    summary.upserted += 1;
                    summary.defaulted_fields += report.defaulted_fields.len();
                    if report.low_quality_renewal {
                        summary.low_quality_renewals += 1;
                    }
                    summary.reports.push(report);
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "ingest.upsert_failed",
                        product_id = %raw.id,
                        error = %error,
                        "skipping record that failed to upsert"
                    );
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!(
            event_name = "ingest.completed",
            total = summary.total,
            upserted = summary.upserted,
            skipped = summary.skipped,
            defaulted_fields = summary.defaulted_fields,
            low_quality_renewals = summary.low_quality_renewals,
            "ingestion batch completed"
        );
        summary
    }
}
