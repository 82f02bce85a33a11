use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use dvlens_core::error::{classify, AnalysisError, ErrorKind, Failure};
use dvlens_core::response::FailureEnvelope;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{}", .0.message)]
    Analysis(Failure),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl AppError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::from(AnalysisError::invalid_request(message))
    }
}

impl From<AnalysisError> for AppError {
    fn from(error: AnalysisError) -> Self {
        Self::Analysis(classify(&error))
    }
}

impl From<Failure> for AppError {
    fn from(failure: Failure) -> Self {
        Self::Analysis(failure)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let failure = match self {
            AppError::Analysis(failure) => failure,
            AppError::NotFound { resource } => Failure {
                kind: ErrorKind::InvalidRequest,
                message: format!("No route found for {}", resource),
                http_status: 404,
                failures: Vec::new(),
                suggest_local: false,
            },
            AppError::PayloadTooLarge { limit } => Failure {
                kind: ErrorKind::InvalidRequest,
                message: format!("Request body exceeds the {} byte limit", limit),
                http_status: 413,
                failures: Vec::new(),
                suggest_local: false,
            },
        };

        let status =
            StatusCode::from_u16(failure.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, failure.message);
        } else {
            warn!("Request rejected with {}: {}", status, failure.message);
        }

        (status, Json(FailureEnvelope::from(failure))).into_response()
    }
}

// 404 handler
pub async fn handle_404(uri: Uri) -> AppError {
    AppError::NotFound {
        resource: uri.path().to_string(),
    }
}

pub type AppResult<T> = Result<T, AppError>;
