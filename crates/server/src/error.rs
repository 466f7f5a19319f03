use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use spandsl::SpanError;
use thiserror::Error;

use crate::http::CompileResponse;

/// Unified error type for the HTTP server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Request body missing, malformed or without a usable query
    #[error("Missing or invalid query parameter")]
    InvalidRequest,

    /// Lexer, parser or code generator rejected the query
    #[error("{}: {}", .0.name(), .0)]
    Compile(#[from] SpanError),

    /// Metrics registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ServerError
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest | ServerError::Compile(_) => StatusCode::BAD_REQUEST,
            ServerError::Metrics(_) | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(CompileResponse::failure(self.to_string()))).into_response()
    }
}
