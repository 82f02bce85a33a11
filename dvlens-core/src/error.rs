use crate::ai_provider::ProviderError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, caller-facing failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidRequest,
    MissingCredential,
    ProviderAuthRejected,
    ProviderRateLimited,
    ProviderUnavailable,
    ProviderMalformedResponse,
    AttemptTimedOut,
    AllCandidatesExhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::MissingCredential => "MissingCredential",
            ErrorKind::ProviderAuthRejected => "ProviderAuthRejected",
            ErrorKind::ProviderRateLimited => "ProviderRateLimited",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::ProviderMalformedResponse => "ProviderMalformedResponse",
            ErrorKind::AttemptTimedOut => "AttemptTimedOut",
            ErrorKind::AllCandidatesExhausted => "AllCandidatesExhausted",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed candidate, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub model: String,
    pub error: ProviderError,
}

/// Everything that stops a request from producing an analysis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Provider credential is not configured")]
    MissingCredential,
    #[error("All {} candidate model(s) failed", .0.len())]
    Exhausted(Vec<AttemptFailure>),
}

impl AnalysisError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

/// Per-candidate line of a failure reply. Carries no provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    pub model: String,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<u16>,
}

/// Classified failure, ready to be rendered for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    pub http_status: u16,
    pub failures: Vec<FailureDetail>,
    /// Whether the reply should point the caller at local analysis
    pub suggest_local: bool,
}

const LOCAL_HINT: &str = "Local analysis does not depend on the remote provider and can be used instead.";

/// Turn an [`AnalysisError`] into the failure the caller sees.
pub fn classify(error: &AnalysisError) -> Failure {
    match error {
        AnalysisError::InvalidRequest(message) => Failure {
            kind: ErrorKind::InvalidRequest,
            message: message.clone(),
            http_status: 400,
            failures: Vec::new(),
            suggest_local: false,
        },
        AnalysisError::MissingCredential => Failure {
            kind: ErrorKind::MissingCredential,
            message: "Remote analysis is not configured on this server".to_string(),
            http_status: 500,
            failures: Vec::new(),
            suggest_local: false,
        },
        AnalysisError::Exhausted(attempts) => classify_exhausted(attempts),
    }
}

fn classify_exhausted(attempts: &[AttemptFailure]) -> Failure {
    let failures: Vec<FailureDetail> = attempts
        .iter()
        .map(|a| FailureDetail {
            model: a.model.clone(),
            kind: a.error.kind(),
            provider_status: a.error.status(),
        })
        .collect();

    let all_timed_out = !attempts.is_empty() && attempts.iter().all(|a| a.error.is_timeout());
    let any = |kind: ErrorKind| failures.iter().any(|f| f.kind == kind);
    let last_outage = attempts.iter().rev().find_map(|a| match a.error {
        ProviderError::Unavailable { status } => Some(status),
        _ => None,
    });

    let (http_status, summary) = if all_timed_out {
        (
            504,
            "The AI provider did not answer within the time budget".to_string(),
        )
    } else if any(ErrorKind::ProviderAuthRejected) {
        (401, "The AI provider rejected the configured API key".to_string())
    } else if any(ErrorKind::ProviderRateLimited) {
        (
            429,
            "The AI provider rate limit was exceeded, retry in a moment".to_string(),
        )
    } else if let Some(status) = last_outage {
        (
            status,
            format!("The AI provider is currently unavailable (HTTP {})", status),
        )
    } else if any(ErrorKind::ProviderMalformedResponse) {
        (500, "The AI provider returned an unreadable response".to_string())
    } else {
        (500, "The AI analysis failed".to_string())
    };

    Failure {
        kind: ErrorKind::AllCandidatesExhausted,
        message: format!(
            "{} after trying {} model(s). {}",
            summary,
            attempts.len(),
            LOCAL_HINT
        ),
        http_status,
        failures,
        suggest_local: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failed(model: &str, error: ProviderError) -> AttemptFailure {
        AttemptFailure {
            model: model.to_string(),
            error,
        }
    }

    fn timed_out(model: &str) -> AttemptFailure {
        failed(
            model,
            ProviderError::TimedOut {
                after: Duration::from_secs(3),
            },
        )
    }

    #[test]
    fn test_invalid_request_is_400() {
        let failure = classify(&AnalysisError::invalid_request("Missing prompt"));
        assert_eq!(failure.kind, ErrorKind::InvalidRequest);
        assert_eq!(failure.http_status, 400);
        assert_eq!(failure.message, "Missing prompt");
        assert!(!failure.suggest_local);
    }

    #[test]
    fn test_missing_credential_does_not_leak_variable_name() {
        let failure = classify(&AnalysisError::MissingCredential);
        assert_eq!(failure.kind, ErrorKind::MissingCredential);
        assert_eq!(failure.http_status, 500);
        assert!(!failure.message.contains("API_KEY"));
    }

    #[test]
    fn test_all_timeouts_is_504() {
        let failure = classify(&AnalysisError::Exhausted(vec![timed_out("a"), timed_out("b")]));

        assert_eq!(failure.kind, ErrorKind::AllCandidatesExhausted);
        assert_eq!(failure.http_status, 504);
        assert_eq!(failure.failures.len(), 2);
        assert!(failure.failures.iter().all(|f| f.kind == ErrorKind::AttemptTimedOut));
        assert!(failure.suggest_local);
        assert!(failure.message.contains("Local analysis"));
    }

    #[test]
    fn test_auth_rejection_wins_over_timeout() {
        let failure = classify(&AnalysisError::Exhausted(vec![
            timed_out("a"),
            failed("b", ProviderError::AuthRejected { status: 401 }),
        ]));
        assert_eq!(failure.http_status, 401);
    }

    #[test]
    fn test_rate_limit_is_429() {
        let failure = classify(&AnalysisError::Exhausted(vec![
            failed("a", ProviderError::RateLimited),
            failed("b", ProviderError::Unavailable { status: 503 }),
        ]));
        assert_eq!(failure.http_status, 429);
        assert!(failure.message.contains("rate limit"));
    }

    #[test]
    fn test_outage_status_passes_through() {
        let failure = classify(&AnalysisError::Exhausted(vec![
            failed("a", ProviderError::Unavailable { status: 502 }),
            failed("b", ProviderError::Unavailable { status: 529 }),
        ]));
        assert_eq!(failure.http_status, 529);
        assert_eq!(failure.failures[1].provider_status, Some(529));
    }

    #[test]
    fn test_other_failures_are_500() {
        let failure = classify(&AnalysisError::Exhausted(vec![
            failed("a", ProviderError::MissingOutput),
            failed("b", ProviderError::UnexpectedStatus { status: 404 }),
            failed("c", ProviderError::Connection("reset".to_string())),
        ]));
        assert_eq!(failure.http_status, 500);
        assert_eq!(failure.failures[0].kind, ErrorKind::ProviderMalformedResponse);
    }

    #[test]
    fn test_failure_detail_serialization() {
        let detail = FailureDetail {
            model: "m".to_string(),
            kind: ErrorKind::ProviderRateLimited,
            provider_status: Some(429),
        };
        assert_eq!(
            serde_json::to_value(&detail).unwrap(),
            serde_json::json!({"model": "m", "kind": "ProviderRateLimited", "providerStatus": 429})
        );
    }
}
