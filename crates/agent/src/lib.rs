pub mod explain;
pub mod interpreter;
pub mod llm;

pub use explain::LlmExplanationGenerator;
pub use interpreter::LlmRenewalInterpreter;
pub use llm::LlmClient;
