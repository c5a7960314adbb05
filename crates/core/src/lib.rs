pub mod config;
pub mod domain;
pub mod errors;
pub mod explain;
pub mod matching;
pub mod normalizer;

pub use config::{
    AppConfig, ConfigError, LoadOptions, LogFormat, NormalizerConfig, RecommendationConfig,
    ScoringConfig,
};
pub use domain::product::{
    AgeRange, CoverageKind, CoverageTerms, Eligibility, ProductId, ProductRecord, QualityScores,
    RenewalTerms, LIFETIME_YEARS, PREMIUM_AGE_BRACKETS, UNLIMITED_AMOUNT,
};
pub use domain::profile::{
    Attribute, Gender, MaritalStatus, ProfileSignals, UserProfile, UserSegment,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use explain::{ExplanationCapability, ExplanationError, TemplateExplainer};
pub use matching::{Evaluation, MatchCandidate, RecommendationResult, ResultRanker, ScoringEngine};
pub use normalizer::renewal::{InterpreterError, RenewalExtraction, RenewalInterpreter};
pub use normalizer::{FeatureNormalizer, FieldIssue, IngestReport, RawProductRecord};
