use std::path::Path;
use std::sync::Arc;

use covermatch_core::config::{AppConfig, LoadOptions};
use covermatch_core::UserProfile;
use covermatch_index::{connect_with_settings, migrations, SqlProductIndex};
use covermatch_service::RecommendationOrchestrator;
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct RecommendedLine {
    product_id: String,
    name: String,
    company: String,
    composite_score: f64,
    passed_hard_filter: bool,
    explanation: String,
}

#[derive(Debug, Serialize)]
struct RecommendData {
    relaxed: bool,
    correlation_id: String,
    products: Vec<RecommendedLine>,
}

pub async fn run(profile_path: &Path, top: Option<usize>) -> CommandResult {
    let mut options = LoadOptions::default();
    options.overrides.top_n = top;
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("recommend", "config", error.to_string(), 2),
    };

    let profile: UserProfile = match tokio::fs::read_to_string(profile_path).await {
        Ok(payload) => match serde_json::from_str(&payload) {
            Ok(profile) => profile,
            Err(error) => {
                return CommandResult::failure("recommend", "input", error.to_string(), 2)
            }
        },
        Err(error) => return CommandResult::failure("recommend", "input", error.to_string(), 2),
    };

    let pool = match connect_with_settings(
        &config.index.url,
        config.index.max_connections,
        config.index.timeout_secs,
    )
    .await
    {
        Ok(pool) => pool,
        Err(error) => return CommandResult::failure("recommend", "index", error.to_string(), 3),
    };
    if let Err(error) = migrations::run_pending(&pool).await {
        return CommandResult::failure("recommend", "migrations", error.to_string(), 3);
    }

    let index = Arc::new(SqlProductIndex::new(pool));
    let orchestrator = RecommendationOrchestrator::new(&config, index, None);

    match orchestrator.recommend(&profile).await {
        Ok(recommendation) => {
            let data = RecommendData {
                relaxed: recommendation.relaxed,
                correlation_id: recommendation.correlation_id.clone(),
                products: recommendation
                    .products
                    .iter()
                    .map(|product| RecommendedLine {
                        product_id: product.record.id.as_str().to_string(),
                        name: product.record.name.clone(),
                        company: product.record.company.clone(),
                        composite_score: product.candidate.composite_score,
                        passed_hard_filter: product.candidate.passed_hard_filter,
                        explanation: product.explanation.clone(),
                    })
                    .collect(),
            };
            let message = if data.products.is_empty() {
                "no products in catalog".to_string()
            } else {
                format!("{} products recommended", data.products.len())
            };
            CommandResult::success("recommend", message, Some(data))
        }
        Err(error) => CommandResult::failure("recommend", "pipeline", error.to_string(), 3),
    }
}
