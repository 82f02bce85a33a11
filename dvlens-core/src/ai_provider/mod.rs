use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod anthropic;

pub use anthropic::AnthropicClient;

/// Failure of a single provider attempt.
///
/// Every way an attempt can go wrong has its own variant so the classifier
/// can tell a rate limit from an outage from a timeout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Could not reach the provider: {0}")]
    Connection(String),
    #[error("Provider rejected the credential (HTTP {status})")]
    AuthRejected { status: u16 },
    #[error("Provider rate limit exceeded")]
    RateLimited,
    #[error("Provider unavailable (HTTP {status})")]
    Unavailable { status: u16 },
    #[error("Provider returned unexpected HTTP {status}")]
    UnexpectedStatus { status: u16 },
    #[error("Provider response is not valid JSON: {0}")]
    MalformedBody(String),
    #[error("Provider response has no output text")]
    MissingOutput,
    #[error("Attempt timed out after {}ms", .after.as_millis())]
    TimedOut { after: Duration },
}

impl ProviderError {
    /// Map a non-success HTTP status to its failure.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ProviderError::AuthRejected { status },
            429 => ProviderError::RateLimited,
            500..=599 => ProviderError::Unavailable { status },
            _ => ProviderError::UnexpectedStatus { status },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::AuthRejected { .. } => ErrorKind::ProviderAuthRejected,
            ProviderError::RateLimited => ErrorKind::ProviderRateLimited,
            ProviderError::Connection(_)
            | ProviderError::Unavailable { .. }
            | ProviderError::UnexpectedStatus { .. } => ErrorKind::ProviderUnavailable,
            ProviderError::MalformedBody(_) | ProviderError::MissingOutput => {
                ErrorKind::ProviderMalformedResponse
            }
            ProviderError::TimedOut { .. } => ErrorKind::AttemptTimedOut,
        }
    }

    /// HTTP status returned by the provider, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::AuthRejected { status }
            | ProviderError::Unavailable { status }
            | ProviderError::UnexpectedStatus { status } => Some(*status),
            ProviderError::RateLimited => Some(429),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::TimedOut { .. })
    }
}

/// Token accounting reported back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Approximate usage at four characters per token, rounded up.
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        Self {
            prompt_tokens: estimate_tokens(prompt),
            completion_tokens: estimate_tokens(completion),
        }
    }
}

pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

/// One request to the provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Allowance granted by the deadline manager for this attempt
    pub timeout: Duration,
}

/// Successful provider answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Provider-reported usage; None when the response omitted it
    pub usage: Option<TokenUsage>,
}

#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Perform exactly one request/response cycle.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;
    fn provider_name(&self) -> &str;
}
