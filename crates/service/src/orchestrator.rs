//! Request-scope pipeline: retrieval, scoring, ranking, explanation.
//!
//! Retrieval failures are fatal for the request. Everything after scoring
//! degrades gracefully: a missing or slow narrative backend falls back to
//! the deterministic template, and the caller always gets either a ranked
//! result or an explicit error.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::time::timeout;
use uuid::Uuid;

use covermatch_core::{
    AppConfig, ApplicationError, ExplanationCapability, MatchCandidate, ProductRecord,
    ProfileSignals, RecommendationResult, ResultRanker, ScoringEngine, TemplateExplainer,
    UserProfile,
};
use covermatch_index::{CandidateIndex, CoarseFilters};

#[derive(Clone, Debug, Serialize)]
pub struct RecommendedProduct {
    pub record: ProductRecord,
    pub candidate: MatchCandidate,
    pub explanation: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Recommendation {
    pub products: Vec<RecommendedProduct>,
    /// True when the hard filter eliminated every candidate and the ranked
    /// set was drawn from the unfiltered pool.
    pub relaxed: bool,
    pub correlation_id: String,
}

impl Recommendation {
    pub fn result(&self) -> RecommendationResult {
        RecommendationResult {
            candidates: self.products.iter().map(|product| product.candidate.clone()).collect(),
            relaxed: self.relaxed,
        }
    }
}

pub struct RecommendationOrchestrator {
    index: Arc<dyn CandidateIndex>,
    engine: ScoringEngine,
    ranker: ResultRanker,
    template: TemplateExplainer,
    narrative: Option<Arc<dyn ExplanationCapability>>,
    explanation_timeout: Duration,
    coarse_limit: usize,
}

impl RecommendationOrchestrator {
    pub fn new(
        config: &AppConfig,
        index: Arc<dyn CandidateIndex>,
        narrative: Option<Arc<dyn ExplanationCapability>>,
    ) -> Self {
        Self {
            index,
            engine: ScoringEngine::new(config.scoring.clone()),
            ranker: ResultRanker::new(config.recommendation.top_n),
            template: TemplateExplainer::default(),
            narrative,
            explanation_timeout: Duration::from_millis(config.recommendation.explanation_timeout_ms),
            coarse_limit: config.recommendation.coarse_limit,
        }
    }

    pub async fn recommend(&self, profile: &UserProfile) -> Result<Recommendation, ApplicationError> {
        self.recommend_at(profile, Utc::now().date_naive()).await
    }

    /// Same as [`recommend`](Self::recommend) with an explicit reference
    /// date, so age derivation stays reproducible.
    pub async fn recommend_at(
        &self,
        profile: &UserProfile,
        today: NaiveDate,
    ) -> Result<Recommendation, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let signals = ProfileSignals::analyze(profile, today);

        let filters = CoarseFilters {
            age: signals.declared_age,
            companies: Vec::new(),
            limit: Some(self.coarse_limit),
        };
        let mut pool = self.query(&filters, &correlation_id).await?;
        if pool.is_empty() && filters.age.is_some() {
            // The coarse filter can empty the pool on its own (an age no
            // product covers). The non-empty contract still applies, so
            // retry unfiltered and let the hard filter mark ineligibility.
            let unfiltered =
                CoarseFilters { limit: Some(self.coarse_limit), ..CoarseFilters::default() };
            pool = self.query(&unfiltered, &correlation_id).await?;
        }

        if pool.is_empty() {
            tracing::info!(
                event_name = "recommend.empty_pool",
                correlation_id = %correlation_id,
                "no candidates in catalog for coarse filters"
            );
            return Ok(Recommendation { products: Vec::new(), relaxed: false, correlation_id });
        }

        let evaluation = self.engine.evaluate(&signals, &pool)?;
        let eligible = evaluation.eligible();
        let (candidates, relaxed) = if eligible.is_empty() {
            tracing::info!(
                event_name = "recommend.relaxed",
                correlation_id = %correlation_id,
                pool_size = pool.len(),
                "hard filter eliminated every candidate, relaxing to full pool"
            );
            (evaluation.full_pool(), true)
        } else {
            (eligible, false)
        };
        let ranked = self.ranker.rank(candidates, &pool);

        let mut products = Vec::with_capacity(ranked.len());
        for candidate in ranked {
            let Some(record) =
                pool.iter().find(|record| record.id == candidate.product_id).cloned()
            else {
                continue;
            };
            let explanation = self.explain(&record, &candidate, &correlation_id).await;
            products.push(RecommendedProduct { record, candidate, explanation });
        }

        tracing::info!(
            event_name = "recommend.completed",
            correlation_id = %correlation_id,
            pool_size = pool.len(),
            returned = products.len(),
            relaxed,
            "recommendation completed"
        );
        Ok(Recommendation { products, relaxed, correlation_id })
    }

    async fn query(
        &self,
        filters: &CoarseFilters,
        correlation_id: &str,
    ) -> Result<Vec<ProductRecord>, ApplicationError> {
        self.index.query(filters).await.map_err(|error| {
            tracing::error!(
                event_name = "recommend.retrieval_failed",
                correlation_id = %correlation_id,
                error = %error,
                "candidate retrieval failed"
            );
            ApplicationError::Retrieval(error.to_string())
        })
    }

    async fn explain(
        &self,
        record: &ProductRecord,
        candidate: &MatchCandidate,
        correlation_id: &str,
    ) -> String {
        let Some(narrative) = &self.narrative else {
            return self.template.explain(record, candidate);
        };

        match timeout(self.explanation_timeout, narrative.explain(record, candidate)).await {
            Ok(Ok(explanation)) => explanation,
            Ok(Err(error)) => {
                tracing::warn!(
                    event_name = "recommend.explanation_failed",
                    correlation_id = %correlation_id,
                    product_id = record.id.as_str(),
                    error = %error,
                    "narrative explanation failed, using template"
                );
                self.template.explain(record, candidate)
            }
            Err(_) => {
                tracing::warn!(
                    event_name = "recommend.explanation_timeout",
                    correlation_id = %correlation_id,
                    product_id = record.id.as_str(),
                    "narrative explanation timed out, using template"
                );
                self.template.explain(record, candidate)
            }
        }
    }
}
