//! Unified API error type and response conversion.
//!
//! Every handler failure crosses the request boundary as a 500 with a
//! `{success:false, error}` JSON body; only missing assets and unknown
//! routes surface as a bare 404. Validation and I/O failures share the
//! same status on purpose, the browser client keys off `success` alone.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::io::ErrorKind;
use tracing::warn;

use crate::multipart::MultipartError;
use crate::storage::StorageError;

pub enum ApiError {
    Protocol(String),
    Validation(String),
    Format(String),
    Io(String),
    NotFound,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, message) = match self {
            ApiError::NotFound => return StatusCode::NOT_FOUND.into_response(),
            ApiError::Protocol(msg) => ("protocol", msg),
            ApiError::Validation(msg) => ("validation", msg),
            ApiError::Format(msg) => ("format", msg),
            ApiError::Io(msg) => ("io", msg),
        };
        warn!(kind, error = %message, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        ApiError::Protocol(error.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidPath => ApiError::NotFound,
            StorageError::Io(err) => match err.kind() {
                ErrorKind::NotFound => ApiError::NotFound,
                _ => ApiError::Io(err.to_string()),
            },
        }
    }
}
