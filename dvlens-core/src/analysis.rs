// End-to-end analysis pipeline
//
// request -> digest -> prompt -> fallback orchestration -> formatted outcome

use crate::ai_provider::{AnthropicClient, ModelClient, TokenUsage};
use crate::config::{ConfigError, CoreConfig};
use crate::corpus::{LogCorpus, LogFile};
use crate::deadline::Budget;
use crate::digest::extract_digest;
use crate::error::{classify, AnalysisError};
use crate::local::{DigestReportAnalyzer, LocalAnalyzer, LOCAL_MODEL};
use crate::orchestrator::{AttemptTemplate, FallbackOrchestrator, ModelCandidate};
use crate::prompt::{bound_prompt, compose_prompt, SYSTEM_INSTRUCTION};
use crate::response::{format_success, AnalysisOutcome};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Corpora above this size get the large-upload advisory on the remote path.
pub const LARGE_CORPUS_BYTES: usize = 1024 * 1024;

const LARGE_CORPUS_NOTICE: &str = "These logs are larger than 1 MB, so only a digest of \
them was sent for AI analysis. Local analysis makes no network round trip and may be faster \
for uploads this size.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    #[serde(rename = "ai")]
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisInput {
    /// Already composed prompt, sent as-is within the ceiling
    Prompt(String),
    Corpus(LogCorpus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub input: AnalysisInput,
    pub mode: AnalysisMode,
}

impl AnalysisRequest {
    /// Build a request from the caller's optional fields.
    ///
    /// Uploaded files win over a prompt when both carry content.
    pub fn from_parts(
        prompt: Option<String>,
        files: Option<Vec<LogFile>>,
        mode: AnalysisMode,
    ) -> Result<Self, AnalysisError> {
        let corpus = files.map(LogCorpus::new).filter(|c| !c.is_empty());
        let prompt = prompt.filter(|p| !p.trim().is_empty());

        let input = match (corpus, prompt) {
            (Some(corpus), _) => AnalysisInput::Corpus(corpus),
            (None, Some(prompt)) => AnalysisInput::Prompt(prompt),
            (None, None) => {
                return Err(AnalysisError::invalid_request(
                    "Request must contain a prompt or at least one non-empty log file",
                ))
            }
        };
        Ok(Self { input, mode })
    }

    pub fn remote(input: AnalysisInput) -> Self {
        Self {
            input,
            mode: AnalysisMode::Remote,
        }
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        match &self.input {
            AnalysisInput::Prompt(p) if p.trim().is_empty() => {
                Err(AnalysisError::invalid_request("Prompt is empty"))
            }
            AnalysisInput::Corpus(c) if c.is_empty() => {
                Err(AnalysisError::invalid_request("Log files are empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Shared, read-only entry point used by the web server and the CLI.
pub struct AnalysisService {
    config: Arc<CoreConfig>,
    candidates: Vec<ModelCandidate>,
    client: Option<Arc<dyn ModelClient>>,
    local: Arc<dyn LocalAnalyzer>,
}

impl AnalysisService {
    /// Wire the Anthropic client when a credential is configured.
    pub fn from_config(config: CoreConfig) -> Result<Self, ConfigError> {
        let client: Option<Arc<dyn ModelClient>> = match &config.credential {
            Some(credential) => Some(Arc::new(
                AnthropicClient::new(credential.clone(), config.provider_url.clone())
                    .map_err(ConfigError::HttpClient)?,
            )),
            None => None,
        };
        Ok(Self::assemble(config, client))
    }

    pub fn with_client(config: CoreConfig, client: Arc<dyn ModelClient>) -> Self {
        Self::assemble(config, Some(client))
    }

    fn assemble(config: CoreConfig, client: Option<Arc<dyn ModelClient>>) -> Self {
        let local = Arc::new(DigestReportAnalyzer::new(config.extraction_policy()));
        Self {
            candidates: ModelCandidate::from_list(&config.models),
            config: Arc::new(config),
            client,
            local,
        }
    }

    pub fn with_local_analyzer(mut self, local: Arc<dyn LocalAnalyzer>) -> Self {
        self.local = local;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Whether remote requests can be served at all.
    pub fn remote_ready(&self) -> bool {
        self.config.has_credential() && self.client.is_some()
    }

    /// Run one request to completion. Never panics, never fails: every
    /// problem is folded into [`AnalysisOutcome::Failure`].
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("analysis", %request_id, mode = ?request.mode);

        async move {
            match self.run(request).await {
                Ok(outcome) => {
                    info!("Analysis completed");
                    outcome
                }
                Err(e) => {
                    let failure = classify(&e);
                    warn!(
                        "Analysis failed: {} (kind {}, HTTP {})",
                        e, failure.kind, failure.http_status
                    );
                    AnalysisOutcome::Failure(failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        request.validate()?;

        match request.mode {
            AnalysisMode::Local => match request.input {
                AnalysisInput::Corpus(corpus) => Ok(self.run_local(&corpus)),
                AnalysisInput::Prompt(_) => Err(AnalysisError::invalid_request(
                    "Local analysis needs log files, not a prompt",
                )),
            },
            AnalysisMode::Remote => self.run_remote(request.input).await,
        }
    }

    fn run_local(&self, corpus: &LogCorpus) -> AnalysisOutcome {
        info!(
            "Running local analysis over {} file(s), {} bytes",
            corpus.files().len(),
            corpus.size_bytes()
        );
        let report = self.local.analyze(corpus);
        AnalysisOutcome::Success {
            text: report.text,
            model_used: LOCAL_MODEL.to_string(),
            usage: TokenUsage::default(),
            timestamp: Utc::now(),
            notice: None,
        }
    }

    async fn run_remote(&self, input: AnalysisInput) -> Result<AnalysisOutcome, AnalysisError> {
        // Credential problems are fatal for the request and never retried
        let client = match (&self.config.credential, &self.client) {
            (Some(_), Some(client)) => client.clone(),
            _ => return Err(AnalysisError::MissingCredential),
        };

        // Digest extraction counts against the request budget too
        let budget = Budget::new(self.config.request_budget(), self.config.min_attempt());
        self.run_within(input, client.as_ref(), &budget).await
    }

    async fn run_within(
        &self,
        input: AnalysisInput,
        client: &dyn ModelClient,
        budget: &Budget,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let ceiling = self.config.prompt_char_ceiling;
        let mut notice = None;
        let prompt = match input {
            AnalysisInput::Prompt(prompt) => bound_prompt(&prompt, ceiling),
            AnalysisInput::Corpus(corpus) => {
                if corpus.size_bytes() > LARGE_CORPUS_BYTES {
                    warn!(
                        "Large upload of {} bytes on the remote path; local analysis is recommended",
                        corpus.size_bytes()
                    );
                    notice = Some(LARGE_CORPUS_NOTICE.to_string());
                }
                let digest = extract_digest(&corpus, &self.config.extraction_policy());
                info!(
                    "Digest: {} file(s), {} line(s) scanned, verbatim={}, {} chars",
                    digest.files().len(),
                    digest.scanned_lines(),
                    digest.is_verbatim(),
                    digest.total_chars()
                );
                compose_prompt(&digest, ceiling)
            }
        };

        let template = AttemptTemplate {
            prompt,
            system: Some(SYSTEM_INSTRUCTION.to_string()),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let success = FallbackOrchestrator::new(client, &self.candidates)
            .run(&template, budget)
            .await
            .map_err(AnalysisError::Exhausted)?;

        info!(
            "Model {} answered after {} attempt(s) in {}ms",
            success.model,
            success.attempts,
            budget.elapsed().as_millis()
        );

        Ok(format_success(
            success.completion,
            success.model,
            &template.prompt,
            notice,
        ))
    }
}
