//! HTTP mapping for [`CodestepError`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use codestep_shared::CodestepError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error; renders as `{"error": message}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub CodestepError);

impl From<CodestepError> for ApiError {
    fn from(err: CodestepError) -> Self {
        Self(err)
    }
}

pub(crate) fn error_status(err: &CodestepError) -> StatusCode {
    match err {
        CodestepError::Validation { .. } => StatusCode::BAD_REQUEST,
        CodestepError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CodestepError::Forbidden(_) => StatusCode::FORBIDDEN,
        CodestepError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = error_status(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
