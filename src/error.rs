//! Error types for Sightline server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The search engine rejected or failed an aggregation request.
    /// Carries the engine's own diagnostic payload for triage.
    #[error("Aggregation execution failed: {0}")]
    AggregationExecution(String),

    /// Transport-level failure reaching the search engine (includes
    /// client-side request timeouts).
    #[error("Search transport error: {0}")]
    SearchTransport(#[from] reqwest::Error),

    /// The query-scoped cancellation signal fired. Distinct from both
    /// success and failure; never reported as an engine error.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BadRequest", msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Validation", msg.clone())
            }
            AppError::AggregationExecution(msg) => {
                tracing::error!("Aggregation execution failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "AggregationExecution",
                    "Aggregation execution failed".to_string(),
                )
            }
            AppError::SearchTransport(e) => {
                tracing::error!("Search transport error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "SearchTransport",
                    "Search engine unreachable".to_string(),
                )
            }
            AppError::Cancelled => (
                StatusCode::REQUEST_TIMEOUT,
                "Cancelled",
                "Request cancelled before completion".to_string(),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
