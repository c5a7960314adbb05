//! Model-backed renewal extraction for clauses the rule parser cannot read.

use async_trait::async_trait;
use serde::Deserialize;

use covermatch_core::{InterpreterError, RenewalExtraction, RenewalInterpreter, RenewalTerms};

use crate::llm::{extract_json_object, LlmClient};

const PROMPT_HEADER: &str = "You are an insurance policy analyst. Extract the renewal terms \
from the clause below. Reply with a single JSON object and nothing else:\n\
{\"guaranteed_renewal_years\": <int, 999 for lifetime>, \
\"max_renewal_age\": <int, 0 if unstated>, \
\"underwriting_required\": <bool>, \
\"rate_adjustable\": <bool>, \
\"confidence\": <float in [0,1]>}\n\nClause:\n";

#[derive(Debug, Deserialize)]
struct InterpreterReply {
    guaranteed_renewal_years: u32,
    #[serde(default)]
    max_renewal_age: u32,
    underwriting_required: bool,
    rate_adjustable: bool,
    confidence: f64,
}

pub struct LlmRenewalInterpreter<C> {
    client: C,
}

impl<C> LlmRenewalInterpreter<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: LlmClient> RenewalInterpreter for LlmRenewalInterpreter<C> {
    async fn interpret(&self, text: &str) -> Result<RenewalExtraction, InterpreterError> {
        let prompt = format!("{PROMPT_HEADER}{text}");
        let reply = self
            .client
            .complete(&prompt)
            .await
            .map_err(|error| InterpreterError::Unavailable(error.to_string()))?;

        let payload = extract_json_object(&reply)
            .ok_or_else(|| InterpreterError::MalformedReply("no JSON object in reply".into()))?;
        let parsed: InterpreterReply = serde_json::from_str(payload)
            .map_err(|error| InterpreterError::MalformedReply(error.to_string()))?;

        Ok(RenewalExtraction {
            terms: RenewalTerms {
                guaranteed_renewal_years: parsed.guaranteed_renewal_years,
                max_renewal_age: parsed.max_renewal_age,
                underwriting_required: parsed.underwriting_required,
                rate_adjustable: parsed.rate_adjustable,
            },
            quality: parsed.confidence,
        })
    }
}
