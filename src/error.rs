use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use graph_flow::GraphError;

use crate::models::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Research workflow failed: {0}")]
    Workflow(#[from] GraphError),

    #[error("Research workflow stopped: {0}")]
    Aborted(String),

    #[error("Research context missing from session {0}")]
    MissingContext(String),
}

/// Errors surfaced by the HTTP layer before the pipeline runs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
