use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use inference::InferenceError;
use serde::Serialize;
use thiserror::Error;

/// Rejections raised on raw upload bytes, before any decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("Image too large: {size} bytes exceeds the maximum of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("Empty image file")]
    Empty,

    #[error("Invalid image format: {0}")]
    MalformedImage(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Image processing failed: {0}")]
    Corrupt(String),

    #[error("Image processing failed: decoded image has no pixels")]
    EmptyPixelBuffer,
}

/// Request-level failure, rendered as a JSON error body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Service not ready")]
    NotReady,

    #[error("Prediction failed: {0}")]
    Inference(String),

    #[error("Maximum {max} images per batch, got {size}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("{0}")]
    BadRequest(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    /// Details stay in the logs; clients get a generic message.
    #[error("Internal server error")]
    Internal(String),
}

impl From<InferenceError> for ServiceError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ModelNotLoaded => ServiceError::NotReady,
            InferenceError::Failed(reason) => ServiceError::Inference(reason),
        }
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(InvalidInput::TooLarge { .. })
            | ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::InvalidInput(_)
            | ServiceError::Decode(_)
            | ServiceError::BatchTooLarge { .. }
            | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Inference(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput(_) => "Invalid input",
            ServiceError::Decode(_) => "Decode error",
            ServiceError::NotReady => "Service unavailable",
            ServiceError::Inference(_) => "Inference error",
            ServiceError::BatchTooLarge { .. } => "Batch too large",
            ServiceError::BadRequest(_) => "Bad request",
            ServiceError::PayloadTooLarge(_) => "Payload too large",
            ServiceError::Internal(_) => "Internal server error",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let ServiceError::Internal(details) = &self {
            tracing::error!(details = %details, "Unhandled error while serving request");
        }

        let body = ErrorBody {
            error: self.kind().to_string(),
            detail: self.to_string(),
            status_code: status.as_u16(),
            timestamp: Utc::now(),
        };

        (status, Json(body)).into_response()
    }
}
