//! Error types and error handling for the application
//!
//! This module defines the HTTP-facing error type. All errors implement
//! `IntoResponse` to provide consistent error formatting.

use crate::generation::GenerationError;
use crate::orchestrator::config::InvalidConfig;
use crate::orchestrator::runner::RunFailure;
use crate::orchestrator::trace_store::TraceStoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Goal is empty or too long
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    /// Configuration update rejected
    #[error(transparent)]
    InvalidConfig(#[from] InvalidConfig),

    /// No trace for the requested run
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// The orchestrator run failed
    #[error("{0}")]
    RunFailed(Box<RunFailure>),

    /// A single generation call failed (baseline)
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// Run trace persistence failed
    #[error("Trace store error: {0}")]
    TraceStore(#[from] TraceStoreError),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RunFailure> for AppError {
    fn from(failure: RunFailure) -> Self {
        AppError::RunFailed(Box::new(failure))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidGoal(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InvalidConfig(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::RunNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::RunFailed(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Generation(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::TraceStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = match self {
            // keep the partial trace visible to the caller
            AppError::RunFailed(failure) => json!({
                "error": error_message,
                "status": status.as_u16(),
                "stage": failure.stage,
                "step_index": failure.step_index,
                "transient": failure.is_transient(),
                "step_errors": failure.step_errors,
                "partial_trace": failure.partial_trace,
            }),
            _ => json!({
                "error": error_message,
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::InvalidGoal("empty".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::RunNotFound("x".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(GenerationError::Fatal("bad".to_string()))
                .into_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
