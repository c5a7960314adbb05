pub mod ingest;
pub mod orchestrator;

pub use ingest::{IngestPipeline, IngestSummary};
pub use orchestrator::{Recommendation, RecommendationOrchestrator, RecommendedProduct};
