use crate::ai_provider::{Completion, TokenUsage};
use crate::error::{ErrorKind, Failure, FailureDetail};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const FOOTER_VERSION: &str = "2024-06";

/// Reference links appended to every remote analysis.
pub const FOOTER: &str = "\n\n---\n\n### Resources (2024-06)\n\
- Obol documentation: https://docs.obol.org\n\
- Charon troubleshooting: https://docs.obol.org/run/running/troubleshooting\n\
- Charon releases: https://github.com/ObolNetwork/charon/releases\n\
- Obol Discord: https://discord.gg/n6ebKsX46w\n";

/// The single result of one analysis request.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success {
        text: String,
        model_used: String,
        usage: TokenUsage,
        timestamp: DateTime<Utc>,
        /// Advisory shown next to the analysis, e.g. for very large uploads
        notice: Option<String>,
    },
    Failure(Failure),
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success { .. })
    }

    /// HTTP status the caller should see.
    pub fn http_status(&self) -> u16 {
        match self {
            AnalysisOutcome::Success { .. } => 200,
            AnalysisOutcome::Failure(failure) => failure.http_status,
        }
    }

    pub fn into_envelope(self) -> ResponseEnvelope {
        match self {
            AnalysisOutcome::Success {
                text,
                model_used,
                usage,
                timestamp,
                notice,
            } => ResponseEnvelope::Success(SuccessEnvelope {
                success: true,
                analysis: text,
                model: model_used,
                usage,
                timestamp: format_timestamp(&timestamp),
                notice,
            }),
            AnalysisOutcome::Failure(failure) => ResponseEnvelope::Failure(failure.into()),
        }
    }
}

/// Success envelope for a remote answer.
///
/// `prompt` is the text that was sent; it only feeds the usage estimate when
/// the provider did not report usage itself.
pub fn format_success(
    completion: Completion,
    model: impl Into<String>,
    prompt: &str,
    notice: Option<String>,
) -> AnalysisOutcome {
    let usage = completion
        .usage
        .unwrap_or_else(|| TokenUsage::estimate(prompt, &completion.text));

    let mut text = completion.text;
    text.push_str(FOOTER);

    AnalysisOutcome::Success {
        text,
        model_used: model.into(),
        usage,
        timestamp: Utc::now(),
        notice,
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub success: bool,
    pub analysis: String,
    pub model: String,
    pub usage: TokenUsage,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEnvelope {
    pub success: bool,
    pub error: String,
    pub kind: ErrorKind,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<Failure> for FailureEnvelope {
    fn from(failure: Failure) -> Self {
        Self {
            success: false,
            error: failure.message,
            kind: failure.kind,
            timestamp: format_timestamp(&Utc::now()),
            failures: failure.failures,
            suggestion: failure.suggest_local.then(|| "local".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success(SuccessEnvelope),
    Failure(FailureEnvelope),
}
