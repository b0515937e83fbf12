//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::WorkflowError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, malformed or expired bearer token, or bad credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Workflow outcome
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Workflow(e) => match e {
                WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                WorkflowError::Permission(_) => StatusCode::FORBIDDEN,
                WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                WorkflowError::Conflict(_) | WorkflowError::Capacity(_) => StatusCode::CONFLICT,
                WorkflowError::State(_) => StatusCode::UNPROCESSABLE_ENTITY,
                WorkflowError::Storage(_) | WorkflowError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match &self {
            ApiError::Unauthorized => ("unauthorized", "Unauthorized".to_string()),
            ApiError::InternalServerError => ("internal", "Internal server error".to_string()),
            ApiError::Workflow(e @ (WorkflowError::Storage(_) | WorkflowError::Internal(_))) => {
                error!("Request failed: {}", e);
                ("internal", "Internal server error".to_string())
            }
            ApiError::Workflow(e) => (e.kind(), e.to_string()),
        };

        let body = Json(json!({
            "error": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WorkflowError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::Permission("x".into()), StatusCode::FORBIDDEN),
            (WorkflowError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (WorkflowError::Conflict("x".into()), StatusCode::CONFLICT),
            (WorkflowError::Capacity("x".into()), StatusCode::CONFLICT),
            (WorkflowError::State("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                WorkflowError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), status);
        }
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
