use covermatch_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigView {
    index_url: String,
    llm_provider: String,
    llm_model: String,
    llm_api_key: &'static str,
    top_n: usize,
    coarse_limit: usize,
    explanation_timeout_ms: u64,
    renewal_quality_threshold: f64,
    log_level: String,
    log_format: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("config", "config", error.to_string(), 2),
    };

    let view = ConfigView {
        index_url: config.index.url.clone(),
        llm_provider: format!("{:?}", config.llm.provider).to_lowercase(),
        llm_model: config.llm.model.clone(),
        // Never echo the key itself, even partially.
        llm_api_key: if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" },
        top_n: config.recommendation.top_n,
        coarse_limit: config.recommendation.coarse_limit,
        explanation_timeout_ms: config.recommendation.explanation_timeout_ms,
        renewal_quality_threshold: config.normalizer.renewal_quality_threshold,
        log_level: config.logging.level.clone(),
        log_format: format!("{:?}", config.logging.format).to_lowercase(),
    };
    CommandResult::success("config", "effective configuration", Some(view))
}
