use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub index: IndexConfig,
    pub llm: LlmConfig,
    pub scoring: ScoringConfig,
    pub normalizer: NormalizerConfig,
    pub recommendation: RecommendationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct IndexConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Every weight, cap, multiplier and threshold the scoring engine reads.
/// Kept external so tuning and golden-value tests never require a rebuild.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub need: NeedMatchConfig,
    pub preference: PreferenceMatchConfig,
    pub value: ValueMatchConfig,
}

/// Layer 2: coverage fit against budget-derived expectations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeedMatchConfig {
    /// Expected general-medical amount = budget x this multiplier.
    pub general_medical_multiplier: f64,
    pub general_medical_weight: f64,
    /// Expected critical-illness amount = budget x this multiplier.
    pub critical_illness_multiplier: f64,
    pub critical_illness_weight: f64,
    /// Acceptable deductible ceiling = budget x this multiplier.
    pub deductible_ceiling_multiplier: f64,
    pub deductible_weight: f64,
    pub reimbursement_weight: f64,
    /// Cap on the whole layer so no single dimension dominates.
    pub cap: f64,
}

impl Default for NeedMatchConfig {
    fn default() -> Self {
        Self {
            general_medical_multiplier: 600.0,
            general_medical_weight: 30.0,
            critical_illness_multiplier: 800.0,
            critical_illness_weight: 25.0,
            deductible_ceiling_multiplier: 2.0,
            deductible_weight: 20.0,
            reimbursement_weight: 25.0,
            cap: 100.0,
        }
    }
}

/// Layer 3: personal-fit boosts, each category independently capped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreferenceMatchConfig {
    pub renewal_reference_years: f64,
    pub renewal_weight: f64,
    pub service_match_increment: f64,
    pub service_cap: f64,
    pub company_affinity_boost: f64,
    pub company_cap: f64,
    pub tag_alignment_boost: f64,
    pub tag_cap: f64,
}

impl Default for PreferenceMatchConfig {
    fn default() -> Self {
        Self {
            renewal_reference_years: 20.0,
            renewal_weight: 50.0,
            service_match_increment: 10.0,
            service_cap: 30.0,
            company_affinity_boost: 15.0,
            company_cap: 15.0,
            tag_alignment_boost: 10.0,
            tag_cap: 20.0,
        }
    }
}

/// Layer 4: budget headroom and over-budget penalties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueMatchConfig {
    /// W1: reward for unused budget headroom.
    pub headroom_weight: f64,
    /// W2: penalty slope within the over-budget boundary.
    pub mild_penalty_weight: f64,
    /// W3: penalty slope beyond the boundary.
    pub steep_penalty_weight: f64,
    /// Over-budget ratio at which the penalty slope changes (0.2 = 1.2x budget).
    pub over_budget_boundary: f64,
    pub cost_performance_weight: f64,
    pub overall_rating_weight: f64,
}

impl Default for ValueMatchConfig {
    fn default() -> Self {
        Self {
            headroom_weight: 35.0,
            mild_penalty_weight: 50.0,
            steep_penalty_weight: 30.0,
            over_budget_boundary: 0.2,
            cost_performance_weight: 0.4,
            overall_rating_weight: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Renewal extractions below this quality fall back to conservative
    /// defaults.
    pub renewal_quality_threshold: f64,
    /// Quality penalty for guaranteed-renewal-with-underwriting extractions.
    pub suspicious_combo_penalty: f64,
    /// Renewal text at or below this length is handled by the rule parser
    /// only; longer text may be routed to the interpretive capability.
    pub rule_parser_max_len: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            renewal_quality_threshold: 0.5,
            suspicious_combo_penalty: 0.3,
            rule_parser_max_len: 40,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub top_n: usize,
    /// Candidates requested from the coarse index query; Layer 1 re-validates.
    pub coarse_limit: usize,
    pub explanation_timeout_ms: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self { top_n: 3, coarse_limit: 50, explanation_timeout_ms: 4_000 }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub index_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub top_n: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { url: "sqlite://covermatch.db".to_string(), max_connections: 5, timeout_secs: 30 }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: Some("http://localhost:11434".to_string()),
            model: "llama3.1".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("covermatch.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(index) = patch.index {
            if let Some(url) = index.url {
                self.index.url = url;
            }
            if let Some(max_connections) = index.max_connections {
                self.index.max_connections = max_connections;
            }
            if let Some(timeout_secs) = index.timeout_secs {
                self.index.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(scoring) = patch.scoring {
            if let Some(need) = scoring.need {
                self.scoring.need = need;
            }
            if let Some(preference) = scoring.preference {
                self.scoring.preference = preference;
            }
            if let Some(value) = scoring.value {
                self.scoring.value = value;
            }
        }

        if let Some(normalizer) = patch.normalizer {
            self.normalizer = normalizer;
        }

        if let Some(recommendation) = patch.recommendation {
            if let Some(top_n) = recommendation.top_n {
                self.recommendation.top_n = top_n;
            }
            if let Some(coarse_limit) = recommendation.coarse_limit {
                self.recommendation.coarse_limit = coarse_limit;
            }
            if let Some(explanation_timeout_ms) = recommendation.explanation_timeout_ms {
                self.recommendation.explanation_timeout_ms = explanation_timeout_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COVERMATCH_INDEX_URL") {
            self.index.url = value;
        }
        if let Some(value) = read_env("COVERMATCH_INDEX_MAX_CONNECTIONS") {
            self.index.max_connections = parse_u32("COVERMATCH_INDEX_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COVERMATCH_INDEX_TIMEOUT_SECS") {
            self.index.timeout_secs = parse_u64("COVERMATCH_INDEX_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COVERMATCH_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("COVERMATCH_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("COVERMATCH_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("COVERMATCH_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("COVERMATCH_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("COVERMATCH_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COVERMATCH_RECOMMENDATION_TOP_N") {
            self.recommendation.top_n =
                parse_u32("COVERMATCH_RECOMMENDATION_TOP_N", &value)? as usize;
        }
        if let Some(value) = read_env("COVERMATCH_RECOMMENDATION_COARSE_LIMIT") {
            self.recommendation.coarse_limit =
                parse_u32("COVERMATCH_RECOMMENDATION_COARSE_LIMIT", &value)? as usize;
        }
        if let Some(value) = read_env("COVERMATCH_EXPLANATION_TIMEOUT_MS") {
            self.recommendation.explanation_timeout_ms =
                parse_u64("COVERMATCH_EXPLANATION_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("COVERMATCH_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("COVERMATCH_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(index_url) = overrides.index_url {
            self.index.url = index_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(top_n) = overrides.top_n {
            self.recommendation.top_n = top_n;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.url.trim().is_empty() {
            return Err(ConfigError::Validation("index.url must not be empty".to_string()));
        }
        if self.recommendation.top_n == 0 {
            return Err(ConfigError::Validation("recommendation.top_n must be >= 1".to_string()));
        }
        if self.recommendation.coarse_limit < self.recommendation.top_n {
            return Err(ConfigError::Validation(
                "recommendation.coarse_limit must be >= top_n".to_string(),
            ));
        }
        validate_scoring(&self.scoring)?;
        validate_normalizer(&self.normalizer)?;
        Ok(())
    }
}

fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    let need = &scoring.need;
    let preference = &scoring.preference;
    let value = &scoring.value;

    let non_negative = [
        ("need.general_medical_weight", need.general_medical_weight),
        ("need.critical_illness_weight", need.critical_illness_weight),
        ("need.deductible_weight", need.deductible_weight),
        ("need.reimbursement_weight", need.reimbursement_weight),
        ("need.cap", need.cap),
        ("preference.renewal_weight", preference.renewal_weight),
        ("preference.service_cap", preference.service_cap),
        ("preference.company_cap", preference.company_cap),
        ("preference.tag_cap", preference.tag_cap),
        ("value.headroom_weight", value.headroom_weight),
        ("value.mild_penalty_weight", value.mild_penalty_weight),
        ("value.steep_penalty_weight", value.steep_penalty_weight),
    ];
    for (name, weight) in non_negative {
        if weight < 0.0 {
            return Err(ConfigError::Validation(format!("scoring.{name} must be >= 0")));
        }
    }

    let positive = [
        ("need.general_medical_multiplier", need.general_medical_multiplier),
        ("need.critical_illness_multiplier", need.critical_illness_multiplier),
        ("need.deductible_ceiling_multiplier", need.deductible_ceiling_multiplier),
        ("preference.renewal_reference_years", preference.renewal_reference_years),
        ("value.over_budget_boundary", value.over_budget_boundary),
    ];
    for (name, parameter) in positive {
        if parameter <= 0.0 {
            return Err(ConfigError::Validation(format!("scoring.{name} must be > 0")));
        }
    }

    Ok(())
}

fn validate_normalizer(normalizer: &NormalizerConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&normalizer.renewal_quality_threshold) {
        return Err(ConfigError::Validation(
            "normalizer.renewal_quality_threshold must be within [0,1]".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&normalizer.suspicious_combo_penalty) {
        return Err(ConfigError::Validation(
            "normalizer.suspicious_combo_penalty must be within [0,1]".to_string(),
        ));
    }
    Ok(())
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("covermatch.toml"), PathBuf::from("config/covermatch.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw).map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    index: Option<IndexPatch>,
    llm: Option<LlmPatch>,
    scoring: Option<ScoringPatch>,
    normalizer: Option<NormalizerConfig>,
    recommendation: Option<RecommendationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct IndexPatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringPatch {
    need: Option<NeedMatchConfig>,
    preference: Option<PreferenceMatchConfig>,
    value: Option<ValueMatchConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationPatch {
    top_n: Option<usize>,
    coarse_limit: Option<usize>,
    explanation_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::io::Write;
    use std::sync::{Mutex, OnceLock};

    use super::*;

    // Serializes every test that reads or writes process environment.
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let _guard = env_lock().lock().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[recommendation]
top_n = 5

[scoring.value]
headroom_weight = 40.0
mild_penalty_weight = 50.0
steep_penalty_weight = 30.0
over_budget_boundary = 0.25
cost_performance_weight = 0.4
overall_rating_weight = 0.3
"#
        )
        .unwrap();

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .unwrap();

        assert_eq!(config.recommendation.top_n, 5);
        assert_eq!(config.scoring.value.headroom_weight, 40.0);
        assert_eq!(config.scoring.value.over_budget_boundary, 0.25);
        // Untouched sections keep their defaults.
        assert_eq!(config.scoring.need.cap, 100.0);
    }

    #[test]
    fn programmatic_override_beats_file() {
        let _guard = env_lock().lock().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[recommendation]\ntop_n = 5").unwrap();

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides { top_n: Some(7), ..ConfigOverrides::default() },
        })
        .unwrap();

        assert_eq!(config.recommendation.top_n, 7);
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COVERMATCH_INDEX_URL", "sqlite://from-env.db");
        env::set_var("COVERMATCH_LOGGING_LEVEL", "warn");

        let result = (|| -> Result<(), String> {
            let mut file = tempfile::NamedTempFile::new().map_err(|err| err.to_string())?;
            writeln!(
                file,
                r#"
[index]
url = "sqlite://from-file.db"
max_connections = 9

[logging]
level = "error"
"#
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(file.path().to_path_buf()),
                require_file: true,
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.index.url == "sqlite://from-env.db",
                "env index url should win over the file value",
            )?;
            ensure(
                config.index.max_connections == 9,
                "file value without an env override should still apply",
            )?;
            ensure(
                config.logging.level == "debug",
                "programmatic override should win over env and file",
            )?;
            Ok(())
        })();

        clear_vars(&["COVERMATCH_INDEX_URL", "COVERMATCH_LOGGING_LEVEL"]);
        result
    }

    #[test]
    fn invalid_env_override_is_an_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COVERMATCH_INDEX_MAX_CONNECTIONS", "plenty");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["COVERMATCH_INDEX_MAX_CONNECTIONS"]);

        ensure(
            matches!(result, Err(ConfigError::InvalidEnvOverride { .. })),
            "non-numeric pool size should be rejected",
        )
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/covermatch.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn zero_top_n_fails_validation() {
        let mut config = AppConfig::default();
        config.recommendation.top_n = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn negative_weight_fails_validation() {
        let mut config = AppConfig::default();
        config.scoring.need.general_medical_weight = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
