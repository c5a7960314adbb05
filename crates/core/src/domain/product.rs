use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Sentinel for monetary fields whose source text reads "unlimited".
///
/// Deliberately far above any plausible coverage amount (the largest real
/// amounts in the catalog are in the 10^7 range) so ratio comparisons against
/// expected amounts saturate instead of silently miscomparing.
pub const UNLIMITED_AMOUNT: f64 = 9_999_999_999.0;

/// Sentinel for "lifetime" renewal guarantees and renewal age limits.
pub const LIFETIME_YEARS: u32 = 999;

/// Fixed age brackets the pricing table is keyed on.
pub const PREMIUM_AGE_BRACKETS: [u32; 15] =
    [0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70];

/// Nearest fixed bracket for an arbitrary age. Brackets are 5 apart, so no
/// integer age is equidistant from two of them.
pub fn nearest_premium_bracket(age: u32) -> u32 {
    PREMIUM_AGE_BRACKETS
        .into_iter()
        .min_by_key(|bracket| bracket.abs_diff(age))
        .unwrap_or(0)
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageKind {
    GeneralMedical,
    CriticalIllness,
    SpecialDisease,
    ExternalDrug,
    ProtonHeavyIon,
    VipMedical,
    Maternity,
}

impl CoverageKind {
    pub const ALL: [CoverageKind; 7] = [
        CoverageKind::GeneralMedical,
        CoverageKind::CriticalIllness,
        CoverageKind::SpecialDisease,
        CoverageKind::ExternalDrug,
        CoverageKind::ProtonHeavyIon,
        CoverageKind::VipMedical,
        CoverageKind::Maternity,
    ];
}

/// Canonical coverage terms for one coverage kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageTerms {
    pub amount: f64,
    pub deductible: f64,
    pub reimbursement_rate_with_social: Option<f64>,
    pub reimbursement_rate_without_social: Option<f64>,
    pub item_count: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderRequirement {
    Male,
    Female,
    #[default]
    Any,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialSecurityRequirement {
    /// Product is only sold to users enrolled in social security.
    Required,
    #[default]
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

impl Default for AgeRange {
    /// Maximally permissive range, used when the source text is unparseable.
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

impl AgeRange {
    pub fn contains(&self, age: u32) -> bool {
        age >= self.min && age <= self.max
    }
}

/// Underwriting eligibility gates, applied by the Layer-1 hard filter.
///
/// Empty allow/deny lists mean "no restriction" on that dimension.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    pub age_range: AgeRange,
    pub occupation_allow: Vec<String>,
    pub occupation_deny: Vec<String>,
    pub region_allow: Vec<String>,
    pub region_deny: Vec<String>,
    pub gender_requirement: GenderRequirement,
    pub social_security_requirement: SocialSecurityRequirement,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenewalTerms {
    pub guaranteed_renewal_years: u32,
    pub max_renewal_age: u32,
    pub underwriting_required: bool,
    pub rate_adjustable: bool,
}

impl Default for RenewalTerms {
    /// Conservative defaults: always the direction less favorable to the user.
    fn default() -> Self {
        Self {
            guaranteed_renewal_years: 0,
            max_renewal_age: 0,
            underwriting_required: true,
            rate_adjustable: true,
        }
    }
}

/// Precomputed editorial quality scores, each bounded [0, 5].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub cost_performance: f64,
    pub coverage_completeness: f64,
    pub renewal_stability: f64,
    pub service_quality: f64,
}

impl QualityScores {
    pub fn overall(&self) -> f64 {
        (self.cost_performance
            + self.coverage_completeness
            + self.renewal_stability
            + self.service_quality)
            / 4.0
    }
}

/// Canonical representation of one insurable product.
///
/// Created and updated only by the offline ingestion path (idempotent upsert
/// by `id`); read-only at query time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub company: String,
    pub eligibility: Eligibility,
    pub coverage: BTreeMap<CoverageKind, CoverageTerms>,
    pub renewal: RenewalTerms,
    /// Confidence attached to the renewal extraction, in [0, 1].
    pub extraction_quality: f64,
    /// Premium by fixed age bracket (0, 5, ..., 70). Brackets without a
    /// published premium are simply absent.
    pub premium_by_age_bracket: BTreeMap<u32, f64>,
    pub value_added_services: Vec<String>,
    pub tags: Vec<String>,
    pub target_groups: Vec<String>,
    pub quality: QualityScores,
}

impl ProductRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            id: ProductId(id.into()),
            name: name.into(),
            company: company.into(),
            eligibility: Eligibility::default(),
            coverage: BTreeMap::new(),
            renewal: RenewalTerms::default(),
            extraction_quality: 0.0,
            premium_by_age_bracket: BTreeMap::new(),
            value_added_services: Vec::new(),
            tags: Vec::new(),
            target_groups: Vec::new(),
            quality: QualityScores::default(),
        }
    }

    /// Premium read from the defined bracket nearest the given age.
    /// Ties break toward the lower bracket.
    pub fn premium_for_age(&self, age: u32) -> Option<f64> {
        let mut best: Option<(u32, f64)> = None;
        for (&bracket, &premium) in &self.premium_by_age_bracket {
            let distance = bracket.abs_diff(age);
            let closer = match best {
                None => true,
                // Strict comparison: ascending iteration means the lower
                // bracket is seen first and wins distance ties.
                Some((best_distance, _)) => distance < best_distance,
            };
            if closer {
                best = Some((distance, premium));
            }
        }
        best.map(|(_, premium)| premium)
    }

    /// Canonical-schema invariants. A violation at scoring time indicates an
    /// internal defect, not bad user input.
    pub fn validate(&self) -> Result<(), DomainError> {
        let fail =
            |reason: String| Err(DomainError::RecordInvariant { id: self.id.0.clone(), reason });

        if self.eligibility.age_range.min > self.eligibility.age_range.max {
            return fail(format!(
                "age_range.min {} exceeds age_range.max {}",
                self.eligibility.age_range.min, self.eligibility.age_range.max
            ));
        }
        if !(0.0..=1.0).contains(&self.extraction_quality) {
            return fail(format!("extraction_quality {} outside [0,1]", self.extraction_quality));
        }
        for (kind, terms) in &self.coverage {
            if terms.amount < 0.0 || terms.deductible < 0.0 {
                return fail(format!("negative amount/deductible for {kind:?}"));
            }
            for rate in
                [terms.reimbursement_rate_with_social, terms.reimbursement_rate_without_social]
                    .into_iter()
                    .flatten()
            {
                if !(0.0..=1.0).contains(&rate) {
                    return fail(format!("reimbursement rate {rate} for {kind:?} outside [0,1]"));
                }
            }
        }
        for (&bracket, &premium) in &self.premium_by_age_bracket {
            if premium < 0.0 {
                return fail(format!("negative premium {premium} at bracket {bracket}"));
            }
        }
        for score in [
            self.quality.cost_performance,
            self.quality.coverage_completeness,
            self.quality.renewal_stability,
            self.quality.service_quality,
        ] {
            if !(0.0..=5.0).contains(&score) {
                return fail(format!("quality score {score} outside [0,5]"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_premiums(brackets: &[(u32, f64)]) -> ProductRecord {
        let mut record = ProductRecord::new("p1", "Test Medical", "Acme Mutual");
        record.premium_by_age_bracket = brackets.iter().copied().collect();
        record
    }

    #[test]
    fn premium_uses_nearest_bracket() {
        let record = record_with_premiums(&[(20, 200.0), (25, 250.0), (30, 300.0)]);
        assert_eq!(record.premium_for_age(26), Some(250.0));
        assert_eq!(record.premium_for_age(29), Some(300.0));
        assert_eq!(record.premium_for_age(70), Some(300.0));
    }

    #[test]
    fn premium_tie_breaks_toward_lower_bracket() {
        let record = record_with_premiums(&[(20, 200.0), (30, 300.0)]);
        assert_eq!(record.premium_for_age(25), Some(200.0));
    }

    #[test]
    fn premium_absent_when_no_brackets_defined() {
        let record = record_with_premiums(&[]);
        assert_eq!(record.premium_for_age(30), None);
    }

    #[test]
    fn nearest_bracket_snaps_arbitrary_ages() {
        assert_eq!(nearest_premium_bracket(0), 0);
        assert_eq!(nearest_premium_bracket(28), 30);
        assert_eq!(nearest_premium_bracket(47), 45);
        assert_eq!(nearest_premium_bracket(90), 70);
    }

    #[test]
    fn validate_rejects_inverted_age_range() {
        let mut record = ProductRecord::new("p1", "Test", "Acme");
        record.eligibility.age_range = AgeRange { min: 60, max: 18 };
        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_rate() {
        let mut record = ProductRecord::new("p1", "Test", "Acme");
        record.coverage.insert(
            CoverageKind::GeneralMedical,
            CoverageTerms {
                amount: 1_000_000.0,
                reimbursement_rate_with_social: Some(1.3),
                ..CoverageTerms::default()
            },
        );
        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_accepts_unlimited_sentinel() {
        let mut record = ProductRecord::new("p1", "Test", "Acme");
        record.coverage.insert(
            CoverageKind::CriticalIllness,
            CoverageTerms { amount: UNLIMITED_AMOUNT, ..CoverageTerms::default() },
        );
        assert!(record.validate().is_ok());
    }
}
