// src/error.rs

//! Error types for the aggregation engine and the HTTP boundary.
//!
//! Provider failures never show up here: they are absorbed inside
//! [`crate::ingest::types::SourceProvider::fetch_items`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Faults in the engine itself.
#[derive(Error, Debug)]
pub enum AggregateError {
    /// The fan-out could not run to completion
    #[error("aggregation interrupted: {0}")]
    Internal(String),

    /// Convenience entry points validate their arguments too
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Client input that never reaches the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("page must be >= 1 (got {0})")]
    Page(i64),

    #[error("pageSize must be within 1..={max} (got {got})")]
    PageSize { got: i64, max: u32 },

    #[error("malformed number for '{field}': {raw}")]
    Malformed { field: &'static str, raw: String },

    #[error("unknown category '{0}'")]
    Category(String),
}

impl QueryError {
    pub fn is_pagination(&self) -> bool {
        !matches!(self, QueryError::Category(_))
    }
}

/// Boundary error, rendered as JSON.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    BadRequest(#[from] QueryError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(q) | ApiError::Aggregate(AggregateError::Query(q)) => {
                tracing::debug!(error = %q, "rejected news query");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        error: if q.is_pagination() {
                            "Invalid pagination parameters"
                        } else {
                            "Invalid category"
                        },
                        message: None,
                    },
                )
            }
            ApiError::Aggregate(e) => {
                tracing::error!(error = %e, "news aggregation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "Failed to fetch news",
                        message: Some(e.to_string()),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
