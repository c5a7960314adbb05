//! Recommendation explanations.
//!
//! The deterministic template generator is the fallback of last resort: it
//! must always produce something readable from a score breakdown alone.
//! Narrative generation lives behind [`ExplanationCapability`] and is
//! allowed to fail or time out; callers recover with the template output.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::product::ProductRecord;
use crate::matching::MatchCandidate;

#[derive(Debug, Error)]
pub enum ExplanationError {
    #[error("explanation backend unavailable: {0}")]
    Unavailable(String),
    #[error("malformed explanation reply: {0}")]
    MalformedReply(String),
}

/// Capability seam for narrative (model-backed) explanation generation.
#[async_trait]
pub trait ExplanationCapability: Send + Sync {
    async fn explain(
        &self,
        record: &ProductRecord,
        candidate: &MatchCandidate,
    ) -> Result<String, ExplanationError>;
}

const DEFAULT_TEMPLATE: &str = "{{name}}（{{company}}）综合评分 {{composite}} 分：\
保障匹配 {{need}} 分，偏好匹配 {{preference}} 分，性价比 {{value}} 分。{{note}}";

/// Deterministic explanation from the score breakdown. Infallible by
/// construction.
#[derive(Clone, Debug)]
pub struct TemplateExplainer {
    template: String,
}

impl Default for TemplateExplainer {
    fn default() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string() }
    }
}

impl TemplateExplainer {
    pub fn with_template(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn explain(&self, record: &ProductRecord, candidate: &MatchCandidate) -> String {
        let note = if candidate.passed_hard_filter {
            String::new()
        } else {
            "该产品未完全满足投保条件，仅供参考。".to_string()
        };

        let variables = HashMap::from([
            ("name".to_string(), record.name.clone()),
            ("company".to_string(), record.company.clone()),
            ("composite".to_string(), format_score(candidate.composite_score)),
            ("need".to_string(), format_score(candidate.layer2_score)),
            ("preference".to_string(), format_score(candidate.layer3_score)),
            ("value".to_string(), format_score(candidate.layer4_score)),
            ("note".to_string(), note),
        ]);
        substitute_variables(&self.template, &variables)
    }
}

fn format_score(score: f64) -> String {
    format!("{score:.1}")
}

fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    let mut output = template.to_string();
    for (key, value) in variables {
        output = output.replace(&format!("{{{{{key}}}}}"), value);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::ProductId;

    fn candidate(passed: bool) -> MatchCandidate {
        MatchCandidate {
            product_id: ProductId("p1".to_string()),
            layer2_score: 55.0,
            layer3_score: 50.0,
            layer4_score: 14.0,
            composite_score: 119.0,
            passed_hard_filter: passed,
        }
    }

    #[test]
    fn template_explainer_substitutes_score_breakdown() {
        let record = ProductRecord::new("p1", "安心医疗险", "平安");
        let explanation = TemplateExplainer::default().explain(&record, &candidate(true));

        assert!(explanation.contains("安心医疗险"));
        assert!(explanation.contains("119.0"));
        assert!(explanation.contains("55.0"));
        assert!(!explanation.contains("{{"));
    }

    #[test]
    fn relaxed_candidates_carry_an_eligibility_note() {
        let record = ProductRecord::new("p1", "安心医疗险", "平安");
        let explanation = TemplateExplainer::default().explain(&record, &candidate(false));
        assert!(explanation.contains("仅供参考"));
    }

    #[test]
    fn custom_templates_are_respected() {
        let record = ProductRecord::new("p1", "Plan A", "Acme");
        let explainer = TemplateExplainer::with_template("{{name}}: {{composite}}");
        assert_eq!(explainer.explain(&record, &candidate(true)), "Plan A: 119.0");
    }
}
