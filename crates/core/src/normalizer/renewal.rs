//! Renewal clause extraction.
//!
//! Renewal text is the least structured field in the catalog. A strict rule
//! parser handles the exact phrasings that appear verbatim in product copy
//! (full extraction quality); anything it cannot match is routed to an
//! injected [`RenewalInterpreter`] capability. Either way the extraction is
//! sanitized before it reaches a canonical record.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::config::NormalizerConfig;
use crate::domain::product::{RenewalTerms, LIFETIME_YEARS};

#[derive(Clone, Debug, PartialEq)]
pub struct RenewalExtraction {
    pub terms: RenewalTerms,
    /// Extraction confidence in [0, 1]. Persisted on the record so query-time
    /// consumers can see how trustworthy the renewal terms are.
    pub quality: f64,
}

impl RenewalExtraction {
    /// Conservative fallback: no guarantee, underwriting assumed, rates
    /// assumed adjustable.
    pub fn conservative(quality: f64) -> Self {
        Self { terms: RenewalTerms::default(), quality }
    }
}

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("renewal interpreter unavailable: {0}")]
    Unavailable(String),
    #[error("malformed interpreter reply: {0}")]
    MalformedReply(String),
}

/// Capability seam for interpretive (model-backed) renewal extraction.
/// Implementations live outside the core crate.
#[async_trait]
pub trait RenewalInterpreter: Send + Sync {
    async fn interpret(&self, text: &str) -> Result<RenewalExtraction, InterpreterError>;
}

fn guaranteed_years_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*(?:年|years?)").expect("static pattern"))
}

fn renewal_age_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:续保至|renew(?:able)?\s+(?:to|until)\s+age\s*)(\d+)")
            .expect("static pattern")
    })
}

fn has_guarantee_marker(lowered: &str) -> bool {
    lowered.contains("保证续保") || lowered.contains("guaranteed renew")
}

fn has_lifetime_marker(lowered: &str) -> bool {
    lowered.contains("终身") || lowered.contains("lifetime")
}

/// Deterministic extraction from the exact phrasings that dominate the
/// catalog. Returns `None` when the text does not match any known form;
/// matched extractions carry quality 1.0.
pub fn parse_renewal_rules(text: &str) -> Option<RenewalExtraction> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let max_renewal_age = renewal_age_re()
        .captures(&lowered)
        .and_then(|captures| captures[1].parse::<u32>().ok());

    let not_guaranteed = lowered.contains("不保证续保")
        || lowered.contains("not guaranteed")
        || lowered.contains("non-guaranteed");

    if not_guaranteed {
        let terms = RenewalTerms {
            guaranteed_renewal_years: 0,
            max_renewal_age: max_renewal_age.unwrap_or(0),
            underwriting_required: true,
            rate_adjustable: true,
        };
        return Some(RenewalExtraction { terms, quality: 1.0 });
    }

    if !has_guarantee_marker(&lowered) {
        return None;
    }

    let guaranteed_renewal_years = if has_lifetime_marker(&lowered) {
        LIFETIME_YEARS
    } else {
        guaranteed_years_re().captures(&lowered)?.get(1)?.as_str().parse().ok()?
    };

    let underwriting_required = lowered.contains("审核")
        || lowered.contains("审查")
        || lowered.contains("underwriting");
    let rate_locked = lowered.contains("费率不变")
        || lowered.contains("费率固定")
        || lowered.contains("fixed rate")
        || lowered.contains("rate locked");

    let terms = RenewalTerms {
        guaranteed_renewal_years,
        max_renewal_age: max_renewal_age.unwrap_or_else(|| {
            if has_lifetime_marker(&lowered) { LIFETIME_YEARS } else { 0 }
        }),
        underwriting_required,
        rate_adjustable: !rate_locked,
    };
    Some(RenewalExtraction { terms, quality: 1.0 })
}

/// Clamp an extraction into the canonical domain and apply the
/// suspicious-combination penalty. A guarantee that still requires
/// underwriting is contradictory; the extraction is kept as-is but its
/// quality is reduced so the threshold check can catch it.
pub fn sanitize_extraction(
    mut extraction: RenewalExtraction,
    config: &NormalizerConfig,
) -> RenewalExtraction {
    let terms = &mut extraction.terms;
    terms.guaranteed_renewal_years = terms.guaranteed_renewal_years.min(LIFETIME_YEARS);
    terms.max_renewal_age = terms.max_renewal_age.min(LIFETIME_YEARS);
    extraction.quality = extraction.quality.clamp(0.0, 1.0);

    if terms.guaranteed_renewal_years > 0 && terms.underwriting_required {
        extraction.quality =
            (extraction.quality - config.suspicious_combo_penalty).max(0.0);
    }
    extraction
}

/// Full extraction pipeline: rule parser, then the interpretive capability
/// for long non-matching text, then sanitation and the quality-threshold
/// fallback. Never fails; the worst case is a conservative extraction with
/// quality 0.
pub async fn interpret_renewal(
    text: &str,
    config: &NormalizerConfig,
    interpreter: Option<&dyn RenewalInterpreter>,
) -> RenewalExtraction {
    let raw = if let Some(extraction) = parse_renewal_rules(text) {
        extraction
    } else {
        let interpretable = text.chars().count() > config.rule_parser_max_len;
        match interpreter {
            Some(interpreter) if interpretable => match interpreter.interpret(text).await {
                Ok(extraction) => extraction,
                Err(error) => {
                    tracing::warn!(%error, "interpretive renewal extraction failed");
                    RenewalExtraction::conservative(0.0)
                }
            },
            _ => RenewalExtraction::conservative(0.0),
        }
    };

    let sanitized = sanitize_extraction(raw, config);
    if sanitized.quality < config.renewal_quality_threshold {
        // Quality is persisted even when the terms are discarded.
        return RenewalExtraction::conservative(sanitized.quality);
    }
    sanitized
}
