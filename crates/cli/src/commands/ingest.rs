use std::path::Path;
use std::sync::Arc;

use covermatch_core::config::{AppConfig, LoadOptions};
use covermatch_index::{connect_with_settings, migrations, SqlProductIndex};
use covermatch_service::IngestPipeline;
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct IngestData {
    total: usize,
    upserted: usize,
    skipped: usize,
    defaulted_fields: usize,
    low_quality_renewals: usize,
}

pub async fn run(file: &Path) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("ingest", "config", error.to_string(), 2),
    };

    let raws = match IngestPipeline::load_records(file).await {
        Ok(raws) => raws,
        Err(error) => return CommandResult::failure("ingest", "input", error.to_string(), 2),
    };

    let pool = match connect_with_settings(
        &config.index.url,
        config.index.max_connections,
        config.index.timeout_secs,
    )
    .await
    {
        Ok(pool) => pool,
        Err(error) => return CommandResult::failure("ingest", "index", error.to_string(), 3),
    };
    if let Err(error) = migrations::run_pending(&pool).await {
        return CommandResult::failure("ingest", "migrations", error.to_string(), 3);
    }

    let index = Arc::new(SqlProductIndex::new(pool));
    let pipeline = IngestPipeline::new(config.normalizer.clone(), index, None);
    let summary = pipeline.ingest(&raws).await;

    let data = IngestData {
        total: summary.total,
        upserted: summary.upserted,
        skipped: summary.skipped,
        defaulted_fields: summary.defaulted_fields,
        low_quality_renewals: summary.low_quality_renewals,
    };
    CommandResult::success(
        "ingest",
        format!("ingested {} of {} records", summary.upserted, summary.total),
        Some(data),
    )
}
