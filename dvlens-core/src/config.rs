use crate::ai_provider::anthropic::DEFAULT_ENDPOINT;
use crate::digest::ExtractionPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub const CREDENTIAL_ENV: &str = "ANTHROPIC_API_KEY";
pub const LEGACY_CREDENTIAL_ENV: &str = "CLAUDE_API_KEY";

const DEFAULT_CONFIG_FILE: &str = "dvlens.toml";
const MAX_BUDGET_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Candidate model list is empty")]
    NoCandidates,
    #[error("Request budget must be between 1 and 300 seconds, got {0}")]
    BudgetOutOfRange(u64),
    #[error("Prompt character ceiling {0} is too small to hold the report instructions")]
    CeilingTooSmall(usize),
    #[error("Failed to build the provider HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Provider API key. Read once at startup and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Process-wide configuration, loaded once and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    #[serde(skip)]
    pub credential: Option<Credential>,
    pub provider_url: String,
    /// Ordered candidate list; position is priority
    pub models: Vec<String>,
    pub request_budget_secs: u64,
    pub min_attempt_ms: u64,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub max_scan_lines: usize,
    pub per_category_cap: usize,
    pub prompt_char_ceiling: usize,
    pub small_corpus_bytes: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            credential: None,
            provider_url: DEFAULT_ENDPOINT.to_string(),
            models: vec![
                "claude-3-5-haiku-20241022".to_string(),
                "claude-3-5-sonnet-20241022".to_string(),
                "claude-3-sonnet-20240229".to_string(),
            ],
            request_budget_secs: 25, // serverless hosts cut requests off at 26 seconds
            min_attempt_ms: 1000,
            max_tokens: 4000,
            temperature: None,
            max_scan_lines: 5000,
            per_category_cap: 25,
            prompt_char_ceiling: 24_000,
            small_corpus_bytes: 8000,
        }
    }
}

/// Smallest ceiling that still leaves room for the fixed report instructions.
pub const MIN_PROMPT_CHAR_CEILING: usize = 1500;

impl CoreConfig {
    /// Defaults, then the optional TOML file, then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let file = env::var("DVLENS_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            });

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        config.report();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(CREDENTIAL_ENV).or_else(|| lookup(LEGACY_CREDENTIAL_ENV)) {
            let key = key.trim();
            if !key.is_empty() {
                self.credential = Some(Credential::new(key));
            }
        }

        if let Some(url) = lookup("DVLENS_PROVIDER_URL") {
            self.provider_url = url;
        }

        if let Some(models) = lookup("DVLENS_MODELS") {
            self.models = models
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(value) = lookup("DVLENS_REQUEST_BUDGET_SECS") {
            self.request_budget_secs = parse_value("DVLENS_REQUEST_BUDGET_SECS", &value)?;
        }
        if let Some(value) = lookup("DVLENS_MIN_ATTEMPT_MS") {
            self.min_attempt_ms = parse_value("DVLENS_MIN_ATTEMPT_MS", &value)?;
        }
        if let Some(value) = lookup("DVLENS_MAX_TOKENS") {
            self.max_tokens = parse_value("DVLENS_MAX_TOKENS", &value)?;
        }
        if let Some(value) = lookup("DVLENS_TEMPERATURE") {
            self.temperature = Some(parse_value("DVLENS_TEMPERATURE", &value)?);
        }
        if let Some(value) = lookup("DVLENS_MAX_SCAN_LINES") {
            self.max_scan_lines = parse_value("DVLENS_MAX_SCAN_LINES", &value)?;
        }
        if let Some(value) = lookup("DVLENS_PER_CATEGORY_CAP") {
            self.per_category_cap = parse_value("DVLENS_PER_CATEGORY_CAP", &value)?;
        }
        if let Some(value) = lookup("DVLENS_PROMPT_CHAR_CEILING") {
            self.prompt_char_ceiling = parse_value("DVLENS_PROMPT_CHAR_CEILING", &value)?;
        }
        if let Some(value) = lookup("DVLENS_SMALL_CORPUS_BYTES") {
            self.small_corpus_bytes = parse_value("DVLENS_SMALL_CORPUS_BYTES", &value)?;
        }

        Ok(())
    }

    /// Structural checks. A missing credential is not an error here; it is
    /// reported by [`CoreConfig::report`] and surfaces per request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        if self.request_budget_secs == 0 || self.request_budget_secs > MAX_BUDGET_SECS {
            return Err(ConfigError::BudgetOutOfRange(self.request_budget_secs));
        }
        if self.prompt_char_ceiling < MIN_PROMPT_CHAR_CEILING {
            return Err(ConfigError::CeilingTooSmall(self.prompt_char_ceiling));
        }
        Ok(())
    }

    /// Log the effective configuration once at boot.
    pub fn report(&self) {
        info!(
            "Remote analysis: {} candidate model(s) [{}], budget {}s, ceiling {} chars",
            self.models.len(),
            self.models.join(", "),
            self.request_budget_secs,
            self.prompt_char_ceiling
        );
        if self.credential.is_none() {
            error!("No provider credential configured; remote analysis requests will be refused");
        }
    }

    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.request_budget_secs)
    }

    pub fn min_attempt(&self) -> Duration {
        Duration::from_millis(self.min_attempt_ms)
    }

    pub fn extraction_policy(&self) -> ExtractionPolicy {
        ExtractionPolicy::new(
            self.max_scan_lines,
            self.per_category_cap,
            self.small_corpus_bytes,
        )
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
