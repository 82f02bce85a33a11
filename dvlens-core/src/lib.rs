// dvlens core library
// Distributed-validator log digests and remote model analysis

pub mod ai_provider;
pub mod analysis;
pub mod config;
pub mod corpus;
pub mod deadline;
pub mod digest;
pub mod error;
pub mod local;
pub mod orchestrator;
pub mod prompt;
pub mod response;

pub use ai_provider::{AnthropicClient, Completion, CompletionRequest, ModelClient, ProviderError, TokenUsage};
pub use analysis::{AnalysisInput, AnalysisMode, AnalysisRequest, AnalysisService};
pub use config::{ConfigError, CoreConfig, Credential};
pub use corpus::{decode_log_bytes, infer_file_type, LogCorpus, LogFile};
pub use deadline::Budget;
pub use digest::{extract_digest, Category, Digest, ExtractionPolicy};
pub use error::{classify, AnalysisError, ErrorKind, Failure};
pub use local::{DigestReportAnalyzer, LocalAnalyzer, LocalReport};
pub use orchestrator::{FallbackOrchestrator, ModelCandidate};
pub use prompt::compose_prompt;
pub use response::{AnalysisOutcome, ResponseEnvelope};
