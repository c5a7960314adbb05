//! Narrative recommendation explanations. Strictly optional: every failure
//! mode here is recovered by the deterministic template generator.

use async_trait::async_trait;
use serde::Deserialize;

use covermatch_core::{
    ExplanationCapability, ExplanationError, MatchCandidate, ProductRecord,
};

use crate::llm::{extract_json_object, LlmClient};

#[derive(Debug, Deserialize)]
struct ExplanationReply {
    explanation: String,
}

pub struct LlmExplanationGenerator<C> {
    client: C,
}

impl<C> LlmExplanationGenerator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

fn build_prompt(record: &ProductRecord, candidate: &MatchCandidate) -> String {
    format!(
        "You are an insurance advisor. In two or three sentences, explain to the \
         user why this product was recommended. Do not invent facts beyond the \
         scores given. Reply with a single JSON object: {{\"explanation\": \"...\"}}\n\
         Product: {} ({})\n\
         Coverage fit score: {:.1}\n\
         Preference fit score: {:.1}\n\
         Value-for-money score: {:.1}\n\
         Overall score: {:.1}\n\
         Fully eligible: {}",
        record.name,
        record.company,
        candidate.layer2_score,
        candidate.layer3_score,
        candidate.layer4_score,
        candidate.composite_score,
        candidate.passed_hard_filter,
    )
}

#[async_trait]
impl<C: LlmClient> ExplanationCapability for LlmExplanationGenerator<C> {
    async fn explain(
        &self,
        record: &ProductRecord,
        candidate: &MatchCandidate,
    ) -> Result<String, ExplanationError> {
        let reply = self
            .client
            .complete(&build_prompt(record, candidate))
            .await
            .map_err(|error| ExplanationError::Unavailable(error.to_string()))?;

        let payload = extract_json_object(&reply)
            .ok_or_else(|| ExplanationError::MalformedReply("no JSON object in reply".into()))?;
        let parsed: ExplanationReply = serde_json::from_str(payload)
            .map_err(|error| ExplanationError::MalformedReply(error.to_string()))?;

        let explanation = parsed.explanation.trim().to_string();
        if explanation.is_empty() {
            return Err(ExplanationError::MalformedReply("empty explanation".into()));
        }
        Ok(explanation)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use covermatch_core::ProductId;

    use super::*;

    struct CannedClient(String);

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn candidate() -> MatchCandidate {
        MatchCandidate {
            product_id: ProductId("p1".to_string()),
            layer2_score: 55.0,
            layer3_score: 50.0,
            layer4_score: 14.0,
            composite_score: 119.0,
            passed_hard_filter: true,
        }
    }

    #[tokio::test]
    async fn well_formed_reply_yields_the_narrative() {
        let generator = LlmExplanationGenerator::new(CannedClient(
            "{\"explanation\": \"该产品保障充足且价格低于预算。\"}".to_string(),
        ));
        let record = ProductRecord::new("p1", "安心医疗险", "平安");
        let narrative = generator.explain(&record, &candidate()).await.unwrap();
        assert_eq!(narrative, "该产品保障充足且价格低于预算。");
    }

    #[tokio::test]
    async fn empty_explanation_is_rejected() {
        let generator = LlmExplanationGenerator::new(CannedClient(
            "{\"explanation\": \"  \"}".to_string(),
        ));
        let record = ProductRecord::new("p1", "安心医疗险", "平安");
        let error = generator.explain(&record, &candidate()).await.unwrap_err();
        assert!(matches!(error, ExplanationError::MalformedReply(_)));
    }
}
