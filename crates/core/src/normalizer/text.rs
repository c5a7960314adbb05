//! Free-text field parsers.
//!
//! Source product copy mixes Chinese and latin spellings of units and
//! keywords, so every parser accepts both. All parsers are recall-favoring:
//! they return `None` (caller substitutes a permissive default) instead of
//! failing.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::product::{
    AgeRange, GenderRequirement, SocialSecurityRequirement, UNLIMITED_AMOUNT,
};

fn age_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Two bounds separated by a range marker; units optional (years assumed)
    // so "18 to 65 years" parses even though the lower bound is bare.
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(\d+)\s*(周岁|岁|天|日|days?|years?|yrs?)?\s*(?:-|–|—|~|到|至|to)\s*(\d+)\s*(周岁|岁|天|日|days?|years?|yrs?)?",
        )
        .expect("static pattern")
    })
}

fn age_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(周岁|岁|天|日|days?|years?|yrs?)").expect("static pattern")
    })
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(亿|万|w|k)?").expect("static pattern")
    })
}

fn with_social_rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:有社保|含社保|社保内|with\s+social[^\d%]*)(\d+(?:\.\d+)?)\s*%")
            .expect("static pattern")
    })
}

fn without_social_rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:无社保|不含社保|未带社保|without\s+social[^\d%]*)(\d+(?:\.\d+)?)\s*%")
            .expect("static pattern")
    })
}

fn bare_rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("static pattern"))
}

fn is_day_unit(unit: &str) -> bool {
    let unit = unit.to_lowercase();
    unit == "天" || unit == "日" || unit.starts_with("day")
}

fn unrestricted(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    text.is_empty()
        || text.contains("不限")
        || text.contains("无限制")
        || text.contains("no restriction")
        || text.contains("unrestricted")
}

/// Extract an age range from statements like "18 to 65 years",
/// "from 28 days to 65 years" or "出生满28天-70周岁". Day-based minimums
/// round down to 0 years. Returns `None` when no age token is found.
pub fn parse_age_range(text: &str) -> Option<AgeRange> {
    let to_years = |value: u32, unit: Option<&str>| {
        if unit.is_some_and(is_day_unit) { 0 } else { value }
    };

    if let Some(captures) = age_span_re().captures(text) {
        let lower: u32 = captures.get(1)?.as_str().parse().ok()?;
        let upper: u32 = captures.get(3)?.as_str().parse().ok()?;
        let min = to_years(lower, captures.get(2).map(|unit| unit.as_str()));
        let max = to_years(upper, captures.get(4).map(|unit| unit.as_str())).max(min);
        return Some(AgeRange { min, max });
    }

    // Single bound: only usable with an explicit direction marker.
    let captures = age_token_re().captures(text)?;
    let value: u32 = captures.get(1)?.as_str().parse().ok()?;
    let value = to_years(value, captures.get(2).map(|unit| unit.as_str()));
    let lowered = text.to_lowercase();
    if lowered.contains("以下") || lowered.contains("under") {
        Some(AgeRange { min: 0, max: value })
    } else if lowered.contains("以上") || lowered.contains("over") {
        Some(AgeRange { min: value, max: 100 })
    } else {
        None
    }
}

/// Normalize a monetary expression to base currency units.
/// Scale suffixes: 万/w = x10^4, 亿 = x10^8, k = x10^3.
/// "unlimited"/"不限" maps to the shared [`UNLIMITED_AMOUNT`] sentinel.
pub fn parse_amount(text: &str) -> Option<f64> {
    let lowered = text.trim().to_lowercase();
    if lowered.contains("不限") || lowered.contains("无上限") || lowered.contains("unlimited") {
        return Some(UNLIMITED_AMOUNT);
    }

    let cleaned = lowered.replace(',', "");
    for captures in amount_re().captures_iter(&cleaned) {
        let Ok(value) = captures[1].parse::<f64>() else { continue };
        let scale = match captures.get(2).map(|unit| unit.as_str()) {
            Some("亿") => 1e8,
            Some("万") | Some("w") | Some("W") => 1e4,
            Some("k") | Some("K") => 1e3,
            _ => 1.0,
        };
        return Some(value * scale);
    }
    None
}

/// Extract (with-social, without-social) reimbursement rates as fractions.
///
/// A single bare percentage is interpreted as the with-social-insurance
/// rate; the without-social rate is left unset in that case so the
/// assumption cannot leak into without-social scoring.
pub fn parse_reimbursement_rates(text: &str) -> (Option<f64>, Option<f64>) {
    let as_fraction = |raw: &str| raw.parse::<f64>().ok().map(|pct| (pct / 100.0).clamp(0.0, 1.0));

    let with = with_social_rate_re()
        .captures(text)
        .and_then(|captures| as_fraction(&captures[1]));
    let without = without_social_rate_re()
        .captures(text)
        .and_then(|captures| as_fraction(&captures[1]));

    if with.is_none() && without.is_none() {
        let bare = bare_rate_re().captures(text).and_then(|captures| as_fraction(&captures[1]));
        return (bare, None);
    }
    (with, without)
}

/// Split an underwriting constraint phrase into (allow, deny) lists.
/// Phrases carrying an exclusion marker ("excluding ...", "...除外") land in
/// the deny list with the marker stripped; everything else is an allow
/// phrase. Unrestricted text leaves both lists empty.
pub fn parse_constraint_lists(text: &str) -> (Vec<String>, Vec<String>) {
    if unrestricted(text) {
        return (Vec::new(), Vec::new());
    }

    let mut allow = Vec::new();
    let mut deny = Vec::new();

    for phrase in text.split(['，', ',', '；', ';', '/', '、']) {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            continue;
        }
        let lowered = phrase.to_lowercase();
        if let Some(stripped) = lowered.strip_prefix("excluding ") {
            deny.push(stripped.trim().to_string());
        } else if let Some(stripped) = lowered.strip_suffix("除外") {
            deny.push(stripped.trim().to_string());
        } else if lowered.contains("拒保") {
            deny.push(lowered.replace("拒保", "").trim().to_string());
        } else if let Some(stripped) = lowered.strip_prefix("仅限") {
            allow.push(stripped.trim().to_string());
        } else if let Some(stripped) = lowered.strip_prefix("only ") {
            allow.push(stripped.trim().to_string());
        } else {
            allow.push(lowered);
        }
    }

    (allow, deny)
}

pub fn parse_gender_requirement(text: &str) -> GenderRequirement {
    let lowered = text.trim().to_lowercase();
    if unrestricted(&lowered) {
        return GenderRequirement::Any;
    }
    // "女" is a substring of neither marker below, so order matters only
    // for latin spellings ("female" contains "male").
    if lowered.contains("女") || lowered.contains("female") {
        GenderRequirement::Female
    } else if lowered.contains("男") || lowered.contains("male") {
        GenderRequirement::Male
    } else {
        GenderRequirement::Any
    }
}

pub fn parse_social_security_requirement(text: &str) -> SocialSecurityRequirement {
    let lowered = text.trim().to_lowercase();
    if lowered.contains("必须") || lowered.contains("需有社保") || lowered.contains("required") {
        SocialSecurityRequirement::Required
    } else {
        SocialSecurityRequirement::Any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_range_parses_plain_span() {
        assert_eq!(parse_age_range("18 to 65 years"), Some(AgeRange { min: 18, max: 65 }));
        assert_eq!(parse_age_range("18-65周岁"), Some(AgeRange { min: 18, max: 65 }));
    }

    #[test]
    fn age_range_day_minimum_maps_to_zero() {
        assert_eq!(
            parse_age_range("from 28 days to 65 years"),
            Some(AgeRange { min: 0, max: 65 })
        );
        assert_eq!(parse_age_range("出生满28天-70周岁"), Some(AgeRange { min: 0, max: 70 }));
    }

    #[test]
    fn age_range_single_bound_needs_direction_marker() {
        assert_eq!(parse_age_range("65周岁以下"), Some(AgeRange { min: 0, max: 65 }));
        assert_eq!(parse_age_range("50岁以上"), Some(AgeRange { min: 50, max: 100 }));
        assert_eq!(parse_age_range("65周岁"), None);
    }

    #[test]
    fn age_range_unparseable_returns_none() {
        assert_eq!(parse_age_range("见条款"), None);
        assert_eq!(parse_age_range(""), None);
    }

    #[test]
    fn amount_applies_scale_suffixes() {
        assert_eq!(parse_amount("300万"), Some(3_000_000.0));
        assert_eq!(parse_amount("1.5亿"), Some(150_000_000.0));
        assert_eq!(parse_amount("600w"), Some(6_000_000.0));
        assert_eq!(parse_amount("5,000元"), Some(5_000.0));
    }

    #[test]
    fn amount_unlimited_maps_to_sentinel() {
        assert_eq!(parse_amount("不限额"), Some(UNLIMITED_AMOUNT));
        assert_eq!(parse_amount("unlimited"), Some(UNLIMITED_AMOUNT));
    }

    #[test]
    fn reimbursement_two_rate_pattern() {
        let (with, without) = parse_reimbursement_rates("有社保100%，无社保60%");
        assert_eq!(with, Some(1.0));
        assert_eq!(without, Some(0.6));
    }

    #[test]
    fn reimbursement_bare_percentage_is_with_social() {
        let (with, without) = parse_reimbursement_rates("reimburses 80% of expenses");
        assert_eq!(with, Some(0.8));
        assert_eq!(without, None);
    }

    #[test]
    fn constraint_exclusion_phrases_populate_deny() {
        let (allow, deny) = parse_constraint_lists("高危职业除外");
        assert!(allow.is_empty());
        assert_eq!(deny, vec!["高危职业".to_string()]);

        let (allow, deny) = parse_constraint_lists("excluding hazardous occupations");
        assert!(allow.is_empty());
        assert_eq!(deny, vec!["hazardous occupations".to_string()]);
    }

    #[test]
    fn constraint_unrestricted_leaves_lists_empty() {
        assert_eq!(parse_constraint_lists("不限地区"), (Vec::new(), Vec::new()));
        assert_eq!(parse_constraint_lists(""), (Vec::new(), Vec::new()));
    }

    #[test]
    fn gender_requirement_parses_both_scripts() {
        assert_eq!(parse_gender_requirement("仅限女性"), GenderRequirement::Female);
        assert_eq!(parse_gender_requirement("male only"), GenderRequirement::Male);
        assert_eq!(parse_gender_requirement("不限"), GenderRequirement::Any);
    }
}
