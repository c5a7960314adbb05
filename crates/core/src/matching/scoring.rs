//! Per-layer score calculation.
//!
//! Every formula here is pure: the same `(signals, record, config)` triple
//! always yields the same score. All weights come from [`ScoringConfig`].

use crate::config::ScoringConfig;
use crate::domain::product::{
    CoverageKind, CoverageTerms, GenderRequirement, ProductRecord, SocialSecurityRequirement,
};
use crate::domain::profile::{ProfileSignals, UserSegment, DEFAULT_ANNUAL_BUDGET};

pub struct ScoreCalculator {
    config: ScoringConfig,
}

impl ScoreCalculator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Layer 1. Gates only on declared profile values; an unknown attribute
    /// never disqualifies a product.
    pub fn passes_hard_filter(&self, signals: &ProfileSignals, record: &ProductRecord) -> bool {
        let eligibility = &record.eligibility;

        if let Some(age) = signals.declared_age {
            if !eligibility.age_range.contains(age) {
                return false;
            }
        }
        if let Some(occupation) = &signals.occupation {
            if !passes_lists(occupation, &eligibility.occupation_allow, &eligibility.occupation_deny)
            {
                return false;
            }
        }
        if let Some(region) = &signals.region {
            if !passes_lists(region, &eligibility.region_allow, &eligibility.region_deny) {
                return false;
            }
        }
        if let Some(gender) = signals.gender {
            let required = match eligibility.gender_requirement {
                GenderRequirement::Any => None,
                GenderRequirement::Male => Some(crate::domain::profile::Gender::Male),
                GenderRequirement::Female => Some(crate::domain::profile::Gender::Female),
            };
            if required.is_some_and(|required| required != gender) {
                return false;
            }
        }
        if eligibility.social_security_requirement == SocialSecurityRequirement::Required
            && signals.has_social_security == Some(false)
        {
            return false;
        }
        true
    }

    /// Layer 2: coverage fit against budget-derived expected amounts.
    pub fn need_match(&self, signals: &ProfileSignals, record: &ProductRecord) -> f64 {
        let need = &self.config.need;
        let budget = effective_budget(signals);
        let mut score = 0.0;

        if let Some(terms) = record.coverage.get(&CoverageKind::GeneralMedical) {
            let expected = budget * need.general_medical_multiplier;
            score += amount_ratio(terms.amount, expected) * need.general_medical_weight;

            let ceiling = budget * need.deductible_ceiling_multiplier;
            if ceiling > 0.0 {
                score += ((ceiling - terms.deductible) / ceiling).max(0.0) * need.deductible_weight;
            }
            score += applicable_rate(signals, terms) * need.reimbursement_weight;
        }
        if let Some(terms) = record.coverage.get(&CoverageKind::CriticalIllness) {
            let expected = budget * need.critical_illness_multiplier;
            score += amount_ratio(terms.amount, expected) * need.critical_illness_weight;
        }

        score.min(need.cap)
    }

    /// Layer 3: personal-fit boosts, each category independently capped.
    pub fn preference_match(&self, signals: &ProfileSignals, record: &ProductRecord) -> f64 {
        let preference = &self.config.preference;

        let years = f64::from(record.renewal.guaranteed_renewal_years);
        let renewal =
            (years / preference.renewal_reference_years).min(1.0) * preference.renewal_weight;

        let matched_services = signals
            .desired_services
            .iter()
            .filter(|wanted| {
                record.value_added_services.iter().any(|offered| phrase_matches(wanted, offered))
            })
            .count() as f64;
        let services =
            (matched_services * preference.service_match_increment).min(preference.service_cap);

        let company = if signals
            .preferred_companies
            .iter()
            .any(|preferred| phrase_matches(preferred, &record.company))
        {
            preference.company_affinity_boost.min(preference.company_cap)
        } else {
            0.0
        };

        let keywords = segment_keywords(signals.segment);
        let matched_tags = record
            .tags
            .iter()
            .chain(record.target_groups.iter())
            .filter(|tag| keywords.iter().any(|keyword| phrase_matches(keyword, tag)))
            .count() as f64;
        let tags = (matched_tags * preference.tag_alignment_boost).min(preference.tag_cap);

        renewal + services + company + tags
    }

    /// Layer 4: premium against budget, plus editorial quality contributions.
    /// Continuous at the over-budget boundary.
    pub fn value_match(&self, signals: &ProfileSignals, record: &ProductRecord) -> f64 {
        let value = &self.config.value;
        let budget = effective_budget(signals);

        let premium_component = match record.premium_for_age(signals.effective_age()) {
            Some(premium) if premium <= budget => {
                (budget - premium) / budget * value.headroom_weight
            }
            Some(premium) => {
                let ratio = (premium - budget) / budget;
                if ratio <= value.over_budget_boundary {
                    -(ratio * value.mild_penalty_weight)
                } else {
                    -(value.mild_penalty_weight * value.over_budget_boundary
                        + (ratio - value.over_budget_boundary) * value.steep_penalty_weight)
                }
            }
            None => 0.0,
        };

        premium_component
            + record.quality.cost_performance * value.cost_performance_weight
            + record.quality.overall() * value.overall_rating_weight
    }
}

/// A declared non-positive budget would zero every expectation, so the
/// population default takes over.
fn effective_budget(signals: &ProfileSignals) -> f64 {
    if signals.budget > 0.0 { signals.budget } else { DEFAULT_ANNUAL_BUDGET }
}

fn amount_ratio(actual: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return 0.0;
    }
    (actual / expected).min(1.0)
}

/// Reimbursement rate applicable to this user. Users without social security
/// are scored on the without-social rate only; an unset rate contributes
/// nothing rather than borrowing the other rate.
fn applicable_rate(signals: &ProfileSignals, terms: &CoverageTerms) -> f64 {
    match signals.has_social_security {
        Some(false) => terms.reimbursement_rate_without_social.unwrap_or(0.0),
        _ => terms.reimbursement_rate_with_social.unwrap_or(0.0),
    }
}

/// Loose phrase match used for lists of human-entered names: case-folded
/// equality or containment in either direction.
pub(crate) fn phrase_matches(left: &str, right: &str) -> bool {
    let left = left.trim().to_lowercase();
    let right = right.trim().to_lowercase();
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left == right || left.contains(&right) || right.contains(&left)
}

fn passes_lists(value: &str, allow: &[String], deny: &[String]) -> bool {
    if deny.iter().any(|denied| phrase_matches(value, denied)) {
        return false;
    }
    allow.is_empty() || allow.iter().any(|allowed| phrase_matches(value, allowed))
}

/// Catalog tag vocabulary associated with each derived user segment.
fn segment_keywords(segment: UserSegment) -> &'static [&'static str] {
    match segment {
        UserSegment::TechYoung => &["互联网", "年轻", "tech", "young"],
        UserSegment::HighIncome => &["高端", "premium", "vip"],
        UserSegment::YoungProfessional => &["年轻", "young", "职场"],
        UserSegment::FamilyOriented => &["家庭", "儿童", "family", "child"],
        UserSegment::Unknown => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{AgeRange, UNLIMITED_AMOUNT};
    use crate::domain::profile::Gender;

    fn signals() -> ProfileSignals {
        ProfileSignals {
            declared_age: Some(30),
            gender: Some(Gender::Female),
            occupation: Some("软件工程师".to_string()),
            region: Some("北京".to_string()),
            has_social_security: Some(true),
            budget: 5_000.0,
            segment: UserSegment::Unknown,
            risk: Default::default(),
            budget_sensitivity: Default::default(),
            preferred_companies: Vec::new(),
            desired_services: Vec::new(),
        }
    }

    fn record() -> ProductRecord {
        let mut record = ProductRecord::new("p1", "测试医疗险", "平安");
        record.coverage.insert(
            CoverageKind::GeneralMedical,
            CoverageTerms {
                amount: 3_000_000.0,
                deductible: 10_000.0,
                reimbursement_rate_with_social: Some(1.0),
                reimbursement_rate_without_social: Some(0.6),
                item_count: None,
            },
        );
        record
    }

    #[test]
    fn hard_filter_ignores_undeclared_attributes() {
        let calculator = ScoreCalculator::new(ScoringConfig::default());
        let mut record = record();
        record.eligibility.age_range = AgeRange { min: 18, max: 40 };
        record.eligibility.gender_requirement = GenderRequirement::Female;

        let mut unknown = signals();
        unknown.declared_age = None;
        unknown.gender = None;
        assert!(calculator.passes_hard_filter(&unknown, &record));

        let mut declared = signals();
        declared.declared_age = Some(55);
        assert!(!calculator.passes_hard_filter(&declared, &record));
    }

    #[test]
    fn hard_filter_deny_list_wins_over_allow_list() {
        let calculator = ScoreCalculator::new(ScoringConfig::default());
        let mut record = record();
        record.eligibility.occupation_deny = vec!["高危职业".to_string()];

        let mut miner = signals();
        miner.occupation = Some("高危职业（矿工）".to_string());
        assert!(!calculator.passes_hard_filter(&miner, &record));
        assert!(calculator.passes_hard_filter(&signals(), &record));
    }

    #[test]
    fn need_match_saturates_at_expected_amount() {
        let calculator = ScoreCalculator::new(ScoringConfig::default());
        let mut rich = record();
        rich.coverage.get_mut(&CoverageKind::GeneralMedical).unwrap().amount = UNLIMITED_AMOUNT;

        // 3M == budget 5000 x 600 exactly, so both reach the full sub-score.
        assert_eq!(
            calculator.need_match(&signals(), &record()),
            calculator.need_match(&signals(), &rich)
        );
    }

    #[test]
    fn need_match_uses_without_social_rate_for_uninsured_users() {
        let calculator = ScoreCalculator::new(ScoringConfig::default());
        let mut uninsured = signals();
        uninsured.has_social_security = Some(false);

        let insured_score = calculator.need_match(&signals(), &record());
        let uninsured_score = calculator.need_match(&uninsured, &record());
        // 100% vs 60% on a 25-point weight.
        assert!((insured_score - uninsured_score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn preference_match_saturates_renewal_at_reference_years() {
        let calculator = ScoreCalculator::new(ScoringConfig::default());
        let mut twenty = record();
        twenty.renewal.guaranteed_renewal_years = 20;
        let mut lifetime = record();
        lifetime.renewal.guaranteed_renewal_years = crate::domain::product::LIFETIME_YEARS;

        let twenty_score = calculator.preference_match(&signals(), &twenty);
        let lifetime_score = calculator.preference_match(&signals(), &lifetime);
        assert_eq!(twenty_score, lifetime_score);
        assert!((twenty_score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn value_match_is_continuous_at_the_over_budget_boundary() {
        let calculator = ScoreCalculator::new(ScoringConfig::default());
        // Budget 5000, boundary ratio 0.2 => premium 6000.
        let mut just_below = record();
        just_below.premium_by_age_bracket.insert(30, 5_999.0);
        let mut just_above = record();
        just_above.premium_by_age_bracket.insert(30, 6_001.0);

        let below = calculator.value_match(&signals(), &just_below);
        let above = calculator.value_match(&signals(), &just_above);
        assert!(below > above);
        // Steps of 1 currency unit across the boundary stay small.
        assert!((below - above).abs() < 0.05);
    }

    #[test]
    fn value_match_rewards_headroom_and_penalizes_overruns() {
        let calculator = ScoreCalculator::new(ScoringConfig::default());
        let premiums = [3_000.0, 4_500.0, 5_000.0, 6_500.0, 9_000.0];
        let scores: Vec<f64> = premiums
            .iter()
            .map(|&premium| {
                let mut priced = record();
                priced.premium_by_age_bracket.insert(30, premium);
                calculator.value_match(&signals(), &priced)
            })
            .collect();

        for pair in scores.windows(2) {
            assert!(pair[0] > pair[1], "value scores must fall as premium rises: {scores:?}");
        }
    }
}
