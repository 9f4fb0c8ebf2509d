use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use common::prelude::PinServiceError;

const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// `{"error": {"code", "message"}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

/// A pin service failure rendered as an HTTP error response
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ServiceError(#[from] pub PinServiceError);

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self(PinServiceError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PinServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            PinServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            PinServiceError::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
            PinServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            PinServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            PinServiceError::DuplicatePin => StatusCode::CONFLICT,
            PinServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match &self.0 {
            PinServiceError::Validation(_) => "VALIDATION_ERROR",
            PinServiceError::Unauthorized => "UNAUTHORIZED",
            PinServiceError::QuotaExceeded => "QUOTA_EXCEEDED",
            PinServiceError::Forbidden(_) => "FORBIDDEN",
            PinServiceError::NotFound(_) => "NOT_FOUND",
            PinServiceError::DuplicatePin => "DUPLICATE_CONTENT",
            PinServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = match &self.0 {
            // already logged where it happened
            PinServiceError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            e => e.to_string(),
        };
        (self.status(), Json(ErrorBody::new(self.code(), message))).into_response()
    }
}
