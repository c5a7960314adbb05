//! Canonicalization of raw catalog records.
//!
//! Ingestion is recall-favoring: a field that cannot be parsed gets a
//! permissive default and a note in the [`IngestReport`], never an error.
//! Records are only rejected later, by [`ProductRecord::validate`], when a
//! parsed value would violate a canonical invariant.

pub mod renewal;
pub mod text;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::NormalizerConfig;
use crate::domain::product::{
    nearest_premium_bracket, AgeRange, CoverageKind, CoverageTerms, Eligibility, ProductId,
    ProductRecord, QualityScores, PREMIUM_AGE_BRACKETS,
};
use renewal::RenewalInterpreter;

/// One product as it arrives from the catalog feed. Constraint fields are
/// free text; everything textual defaults to empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProductRecord {
    pub id: String,
    pub name: String,
    pub company: String,
    #[serde(default)]
    pub eligible_age: String,
    #[serde(default)]
    pub occupations: String,
    #[serde(default)]
    pub regions: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub social_security: String,
    #[serde(default)]
    pub renewal: String,
    #[serde(default)]
    pub coverage: BTreeMap<CoverageKind, RawCoverage>,
    #[serde(default)]
    pub premiums_by_age: BTreeMap<u32, f64>,
    #[serde(default)]
    pub value_added_services: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub target_groups: Vec<String>,
    #[serde(default)]
    pub quality: QualityScores,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCoverage {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub deductible: String,
    #[serde(default)]
    pub reimbursement: String,
    #[serde(default)]
    pub item_count: Option<u32>,
}

/// A field that could not be parsed and was defaulted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub raw: String,
}

/// Per-record account of what normalization had to default or flag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub product_id: String,
    pub defaulted_fields: Vec<FieldIssue>,
    pub renewal_quality: f64,
    pub low_quality_renewal: bool,
}

impl IngestReport {
    fn note(&mut self, field: &str, raw: &str) {
        self.defaulted_fields
            .push(FieldIssue { field: field.to_string(), raw: raw.to_string() });
    }
}

#[derive(Clone, Debug, Default)]
pub struct FeatureNormalizer {
    config: NormalizerConfig,
}

impl FeatureNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Canonicalize one raw record. Never fails; parse failures surface in
    /// the returned report.
    pub async fn normalize(
        &self,
        raw: &RawProductRecord,
        interpreter: Option<&dyn RenewalInterpreter>,
    ) -> (ProductRecord, IngestReport) {
        let mut report = IngestReport { product_id: raw.id.clone(), ..IngestReport::default() };

        let age_range = match text::parse_age_range(&raw.eligible_age) {
            Some(range) => range,
            None => {
                if !raw.eligible_age.trim().is_empty() {
                    report.note("eligible_age", &raw.eligible_age);
                }
                AgeRange::default()
            }
        };
        let (occupation_allow, occupation_deny) = text::parse_constraint_lists(&raw.occupations);
        let (region_allow, region_deny) = text::parse_constraint_lists(&raw.regions);

        let mut coverage = BTreeMap::new();
        for (&kind, raw_terms) in &raw.coverage {
            coverage.insert(kind, self.normalize_coverage(kind, raw_terms, &mut report));
        }

        let extraction =
            renewal::interpret_renewal(&raw.renewal, &self.config, interpreter).await;
        report.renewal_quality = extraction.quality;
        report.low_quality_renewal = extraction.quality < self.config.renewal_quality_threshold;

        let record = ProductRecord {
            id: ProductId(raw.id.clone()),
            name: raw.name.clone(),
            company: raw.company.clone(),
            eligibility: Eligibility {
                age_range,
                occupation_allow,
                occupation_deny,
                region_allow,
                region_deny,
                gender_requirement: text::parse_gender_requirement(&raw.gender),
                social_security_requirement: text::parse_social_security_requirement(
                    &raw.social_security,
                ),
            },
            coverage,
            renewal: extraction.terms,
            extraction_quality: extraction.quality,
            premium_by_age_bracket: normalize_premiums(&raw.premiums_by_age, &mut report),
            value_added_services: raw.value_added_services.clone(),
            tags: raw.tags.clone(),
            target_groups: raw.target_groups.clone(),
            quality: raw.quality.clone(),
        };

        (record, report)
    }

    fn normalize_coverage(
        &self,
        kind: CoverageKind,
        raw: &RawCoverage,
        report: &mut IngestReport,
    ) -> CoverageTerms {
        let amount = match text::parse_amount(&raw.amount) {
            Some(amount) => amount,
            None => {
                report.note(&format!("coverage.{kind:?}.amount"), &raw.amount);
                0.0
            }
        };
        let deductible = if raw.deductible.trim().is_empty() {
            0.0
        } else {
            match text::parse_amount(&raw.deductible) {
                Some(deductible) => deductible,
                None => {
                    report.note(&format!("coverage.{kind:?}.deductible"), &raw.deductible);
                    0.0
                }
            }
        };
        let (with_social, without_social) = text::parse_reimbursement_rates(&raw.reimbursement);

        CoverageTerms {
            amount,
            deductible,
            reimbursement_rate_with_social: with_social,
            reimbursement_rate_without_social: without_social,
            item_count: raw.item_count,
        }
    }
}

/// Re-key the raw premium table onto the fixed brackets. Exact-bracket
/// entries win; an off-bracket age is snapped to its nearest bracket and
/// noted, but never displaces an exact entry.
fn normalize_premiums(
    raw: &BTreeMap<u32, f64>,
    report: &mut IngestReport,
) -> BTreeMap<u32, f64> {
    let mut premiums = BTreeMap::new();
    for (&age, &premium) in raw {
        if PREMIUM_AGE_BRACKETS.contains(&age) {
            premiums.insert(age, premium);
        }
    }
    for (&age, &premium) in raw {
        if !PREMIUM_AGE_BRACKETS.contains(&age) {
            report.note("premiums_by_age", &age.to_string());
            premiums.entry(nearest_premium_bracket(age)).or_insert(premium);
        }
    }
    premiums
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::UNLIMITED_AMOUNT;

    fn raw_medical_record() -> RawProductRecord {
        let mut coverage = BTreeMap::new();
        coverage.insert(
            CoverageKind::GeneralMedical,
            RawCoverage {
                amount: "300万".to_string(),
                deductible: "1万".to_string(),
                reimbursement: "有社保100%，无社保60%".to_string(),
                item_count: None,
            },
        );
        RawProductRecord {
            id: "med-001".to_string(),
            name: "安心医疗险".to_string(),
            company: "平安".to_string(),
            eligible_age: "出生满28天-65周岁".to_string(),
            occupations: "高危职业除外".to_string(),
            renewal: "保证续保20年".to_string(),
            coverage,
            ..RawProductRecord::default()
        }
    }

    #[tokio::test]
    async fn normalize_produces_canonical_record_without_issues() {
        let normalizer = FeatureNormalizer::default();
        let (record, report) = normalizer.normalize(&raw_medical_record(), None).await;

        assert_eq!(record.eligibility.age_range, AgeRange { min: 0, max: 65 });
        assert_eq!(record.eligibility.occupation_deny, vec!["高危职业".to_string()]);
        let terms = &record.coverage[&CoverageKind::GeneralMedical];
        assert_eq!(terms.amount, 3_000_000.0);
        assert_eq!(terms.deductible, 10_000.0);
        assert_eq!(terms.reimbursement_rate_with_social, Some(1.0));
        assert_eq!(terms.reimbursement_rate_without_social, Some(0.6));
        assert_eq!(record.renewal.guaranteed_renewal_years, 20);
        assert_eq!(record.extraction_quality, 1.0);

        assert!(report.defaulted_fields.is_empty());
        assert!(!report.low_quality_renewal);
        assert!(record.validate().is_ok());
    }

    #[tokio::test]
    async fn unparseable_fields_default_and_are_reported() {
        let mut raw = raw_medical_record();
        raw.eligible_age = "详见条款".to_string();
        raw.coverage.get_mut(&CoverageKind::GeneralMedical).unwrap().amount =
            "见保障计划".to_string();

        let normalizer = FeatureNormalizer::default();
        let (record, report) = normalizer.normalize(&raw, None).await;

        assert_eq!(record.eligibility.age_range, AgeRange::default());
        assert_eq!(record.coverage[&CoverageKind::GeneralMedical].amount, 0.0);
        let fields: Vec<&str> =
            report.defaulted_fields.iter().map(|issue| issue.field.as_str()).collect();
        assert_eq!(fields, vec!["eligible_age", "coverage.GeneralMedical.amount"]);
    }

    #[tokio::test]
    async fn unmatched_renewal_without_interpreter_goes_conservative() {
        let mut raw = raw_medical_record();
        raw.renewal = "续保规则以当年条款为准".to_string();

        let normalizer = FeatureNormalizer::default();
        let (record, report) = normalizer.normalize(&raw, None).await;

        assert_eq!(record.renewal.guaranteed_renewal_years, 0);
        assert!(record.renewal.underwriting_required);
        assert!(report.low_quality_renewal);
        assert_eq!(report.renewal_quality, 0.0);
    }

    #[tokio::test]
    async fn normalize_is_idempotent_on_canonical_text_forms() {
        let normalizer = FeatureNormalizer::default();
        let (first, _) = normalizer.normalize(&raw_medical_record(), None).await;

        // Render the canonical range back to its textual form and re-parse.
        let range = &first.eligibility.age_range;
        let round_tripped =
            text::parse_age_range(&format!("{}-{}周岁", range.min, range.max)).unwrap();
        assert_eq!(&round_tripped, range);

        let (second, _) = normalizer.normalize(&raw_medical_record(), None).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn off_bracket_premium_ages_snap_without_displacing_exact_entries() {
        let mut raw = raw_medical_record();
        raw.premiums_by_age = [(28, 900.0), (30, 1_000.0), (47, 2_000.0)].into_iter().collect();

        let normalizer = FeatureNormalizer::default();
        let (record, report) = normalizer.normalize(&raw, None).await;

        let expected: BTreeMap<u32, f64> = [(30, 1_000.0), (45, 2_000.0)].into_iter().collect();
        assert_eq!(record.premium_by_age_bracket, expected);

        let noted: Vec<&str> = report
            .defaulted_fields
            .iter()
            .filter(|issue| issue.field == "premiums_by_age")
            .map(|issue| issue.raw.as_str())
            .collect();
        assert_eq!(noted, vec!["28", "47"]);
    }

    #[tokio::test]
    async fn unlimited_amount_survives_normalization() {
        let mut raw = raw_medical_record();
        raw.coverage.get_mut(&CoverageKind::GeneralMedical).unwrap().amount =
            "不限".to_string();

        let normalizer = FeatureNormalizer::default();
        let (record, _) = normalizer.normalize(&raw, None).await;
        assert_eq!(record.coverage[&CoverageKind::GeneralMedical].amount, UNLIMITED_AMOUNT);
    }
}
