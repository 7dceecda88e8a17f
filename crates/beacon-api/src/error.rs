//! API error types and JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use beacon_types::TypesError;
use serde::Serialize;

/// Errors returned by discovery API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The client asked for a representation other than JSON.
    #[error("expected \"application/json\" content-type, got {accept:?}")]
    NotAcceptable {
        /// The offending `Accept` header value.
        accept: String,
    },

    /// A query parameter was malformed.
    #[error("invalid type: {0}")]
    InvalidType(#[from] TypesError),

    /// A required query parameter was absent.
    #[error("missing query parameter: {0}")]
    MissingParam(&'static str),

    /// The requested category has no services.
    #[error("no services of type {category:?}")]
    NoSuchType {
        /// The requested category.
        category: String,
    },

    /// No route matched the request.
    #[error("no route for {path}")]
    NoRoute {
        /// Request path.
        path: String,
    },

    /// Internal server error.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal failure.
        message: String,
    },
}

impl ApiError {
    /// Map to an HTTP status code.
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAcceptable { .. } | Self::InvalidType(_) | Self::MissingParam(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NoSuchType { .. } | Self::NoRoute { .. } => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    fn code(&self) -> &'static str {
        match self {
            Self::NotAcceptable { .. } | Self::InvalidType(_) | Self::MissingParam(_) => {
                "bad_request"
            }
            Self::NoSuchType { .. } | Self::NoRoute { .. } => "not_found",
            Self::Internal { .. } => "internal_error",
        }
    }
}

/// JSON error body.
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
