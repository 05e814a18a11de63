use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ScribeError;

/// Body for rejected requests (missing or malformed parameters)
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body for failures raised while serving a request
#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub error: String,
    pub kind: &'static str,
    pub traceback: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Body the extractors could not read, with the status they chose
    Rejected(StatusCode, String),
    Failed(ScribeError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

impl From<ScribeError> for ApiError {
    fn from(err: ScribeError) -> Self {
        match err {
            ScribeError::InvalidInput(message) => ApiError::BadRequest(message),
            other => ApiError::Failed(other),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Rejected(err.status(), err.body_text())
    }
}

pub fn status_for(err: &ScribeError) -> StatusCode {
    match err {
        ScribeError::InvalidUrl(_) | ScribeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ScribeError::NotFound(_) => StatusCode::NOT_FOUND,
        ScribeError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error message followed by each `source()` in the chain, one per line
pub fn render_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut lines = vec![format!("{:?}", err)];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {}", cause));
        source = cause.source();
    }
    lines.join("\n")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
            }
            ApiError::Rejected(status, error) => {
                tracing::warn!(%status, error = %error, "Request body rejected");
                (status, Json(ErrorResponse { error })).into_response()
            }
            ApiError::Failed(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::error!(kind = err.kind(), error = %err, "Request failed");
                } else {
                    tracing::warn!(kind = err.kind(), error = %err, "Request rejected");
                }

                (
                    status,
                    Json(FailureResponse {
                        error: err.to_string(),
                        kind: err.kind(),
                        traceback: render_chain(&err),
                    }),
                )
                    .into_response()
            }
        }
    }
}
