use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use dvlens_core::analysis::{AnalysisMode, AnalysisRequest};
use dvlens_core::corpus::LogFile;
use dvlens_core::response::{AnalysisOutcome, ResponseEnvelope};
use serde::Deserialize;

use crate::{error_handling::AppError, AppState};

/// Body of `POST /api/analyze`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub files_with_content: Option<Vec<LogFile>>,
    #[serde(default)]
    pub mode: AnalysisMode,
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ResponseEnvelope>, AppError> {
    let Json(req) = payload.map_err(|e| {
        tracing::warn!("Rejected analyze body: {}", e.body_text());
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge {
                limit: state.config.max_body_bytes,
            }
        } else {
            AppError::invalid_request(
                "Request body must be a JSON object with a prompt or filesWithContent",
            )
        }
    })?;

    let request = AnalysisRequest::from_parts(req.prompt, req.files_with_content, req.mode)?;

    match state.service.analyze(request).await {
        AnalysisOutcome::Failure(failure) => Err(AppError::from(failure)),
        success => Ok(Json(success.into_envelope())),
    }
}
