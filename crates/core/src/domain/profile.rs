use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Population-level defaults applied when a field was never captured.
/// Documented here because the scoring layers depend on them.
pub const DEFAULT_AGE: u32 = 30;
pub const DEFAULT_ANNUAL_BUDGET: f64 = 5_000.0;

/// Income above which a user is classified as high-income (base currency).
const HIGH_INCOME_THRESHOLD: f64 = 500_000.0;
/// Income above which risk preference shifts toward aggressive.
const UPPER_MIDDLE_INCOME_THRESHOLD: f64 = 300_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
    Widowed,
}

/// One captured profile attribute. The profile service attaches a confidence
/// to every extracted value; a skipped attribute was explicitly declined by
/// the user and must be treated as absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute<T> {
    pub value: T,
    pub confidence: f64,
    #[serde(default)]
    pub skipped: bool,
}

impl<T> Attribute<T> {
    pub fn certain(value: T) -> Self {
        Self { value, confidence: 1.0, skipped: false }
    }

    fn usable(&self) -> Option<&T> {
        (!self.skipped).then_some(&self.value)
    }
}

/// Subset of demographic/financial/health attributes supplied by the external
/// profile service. Every field is optional; unset fields carry no assumption
/// beyond the documented population defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: Option<Attribute<u32>>,
    pub date_of_birth: Option<Attribute<NaiveDate>>,
    pub gender: Option<Attribute<Gender>>,
    pub occupation: Option<Attribute<String>>,
    pub industry: Option<Attribute<String>>,
    pub region: Option<Attribute<String>>,
    pub marital_status: Option<Attribute<MaritalStatus>>,
    pub number_of_children: Option<Attribute<u32>>,
    pub annual_income: Option<Attribute<f64>>,
    pub annual_budget: Option<Attribute<f64>>,
    pub has_social_security: Option<Attribute<bool>>,
    pub has_chronic_disease: Option<Attribute<bool>>,
    pub preferred_companies: Option<Attribute<Vec<String>>>,
    pub desired_services: Option<Attribute<Vec<String>>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSegment {
    TechYoung,
    HighIncome,
    YoungProfessional,
    FamilyOriented,
    #[default]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskPreference {
    Conservative,
    #[default]
    Moderate,
    ModerateAggressive,
    Aggressive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

/// Resolved view of a profile the scoring engine consumes: population
/// defaults applied, derived classifications computed. Pure function of
/// `(profile, today)`, so request scoring stays reproducible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileSignals {
    /// Declared (or birth-date-derived) age; `None` when never captured.
    /// The hard filter only gates on a declared age.
    pub declared_age: Option<u32>,
    pub gender: Option<Gender>,
    pub occupation: Option<String>,
    pub region: Option<String>,
    pub has_social_security: Option<bool>,
    pub budget: f64,
    pub segment: UserSegment,
    pub risk: RiskPreference,
    pub budget_sensitivity: BudgetSensitivity,
    pub preferred_companies: Vec<String>,
    pub desired_services: Vec<String>,
}

impl ProfileSignals {
    pub fn analyze(profile: &UserProfile, today: NaiveDate) -> Self {
        let declared_age = resolve_age(profile, today);
        let income = field(&profile.annual_income).copied();
        let budget = field(&profile.annual_budget).copied().unwrap_or(DEFAULT_ANNUAL_BUDGET);
        let children = field(&profile.number_of_children).copied().unwrap_or(0);
        let married = field(&profile.marital_status) == Some(&MaritalStatus::Married);
        let chronic = field(&profile.has_chronic_disease).copied().unwrap_or(false);

        Self {
            declared_age,
            gender: field(&profile.gender).copied(),
            occupation: field(&profile.occupation).cloned(),
            region: field(&profile.region).cloned(),
            has_social_security: field(&profile.has_social_security).copied(),
            budget,
            segment: classify_segment(profile, declared_age, income, married, children),
            risk: classify_risk(declared_age, income, chronic),
            budget_sensitivity: classify_budget_sensitivity(budget, income),
            preferred_companies: field(&profile.preferred_companies).cloned().unwrap_or_default(),
            desired_services: field(&profile.desired_services).cloned().unwrap_or_default(),
        }
    }

    /// Age used by the value layer's premium lookup: declared age, or the
    /// population default.
    pub fn effective_age(&self) -> u32 {
        self.declared_age.unwrap_or(DEFAULT_AGE)
    }
}

fn field<T>(attribute: &Option<Attribute<T>>) -> Option<&T> {
    attribute.as_ref().and_then(Attribute::usable)
}

fn resolve_age(profile: &UserProfile, today: NaiveDate) -> Option<u32> {
    if let Some(age) = field(&profile.age) {
        return Some(*age);
    }
    let birth = field(&profile.date_of_birth)?;
    // years_since is None when the birth date is after `today`; treat that
    // as age 0 rather than an absent age.
    Some(today.years_since(*birth).unwrap_or(0))
}

fn classify_segment(
    profile: &UserProfile,
    age: Option<u32>,
    income: Option<f64>,
    married: bool,
    children: u32,
) -> UserSegment {
    let industry = field(&profile.industry).map(|value| value.to_lowercase());
    let tech_industry = industry
        .as_deref()
        .is_some_and(|value| value.contains("internet") || value.contains("互联网") || value.contains("tech"));

    if tech_industry && age.is_some_and(|age| age < 35) {
        UserSegment::TechYoung
    } else if income.is_some_and(|income| income > HIGH_INCOME_THRESHOLD) {
        UserSegment::HighIncome
    } else if age.is_some_and(|age| age < 30) {
        UserSegment::YoungProfessional
    } else if married && children > 0 {
        UserSegment::FamilyOriented
    } else {
        UserSegment::Unknown
    }
}

fn classify_risk(age: Option<u32>, income: Option<f64>, chronic: bool) -> RiskPreference {
    if age.is_some_and(|age| age < 30) {
        RiskPreference::Aggressive
    } else if chronic {
        RiskPreference::Conservative
    } else if income.is_some_and(|income| income > UPPER_MIDDLE_INCOME_THRESHOLD) {
        RiskPreference::ModerateAggressive
    } else {
        RiskPreference::Moderate
    }
}

fn classify_budget_sensitivity(budget: f64, income: Option<f64>) -> BudgetSensitivity {
    let Some(income) = income.filter(|income| *income > 0.0) else {
        return BudgetSensitivity::Medium;
    };
    let ratio = budget / income;
    if ratio > 0.05 {
        BudgetSensitivity::Low
    } else if ratio < 0.02 {
        BudgetSensitivity::High
    } else {
        BudgetSensitivity::Medium
    }
}
