//! HTTP error responses.
//!
//! Every failure leaves the service as `{"error": {"code": .., "message": ..}}`
//! with a status derived from the library error's classification.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use br_domain_check_lib::VerifierError;
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub enum AppError {
    Validation { message: String },
    NotFound { message: String },
    Conflict { message: String },
    Internal { message: String },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<VerifierError> for AppError {
    fn from(err: VerifierError) -> Self {
        if err.is_client_error() {
            AppError::bad_request(err.to_string())
        } else if err.is_not_found() {
            AppError::not_found(err.to_string())
        } else if matches!(err, VerifierError::AlreadyStarted { .. }) {
            AppError::conflict(err.to_string())
        } else {
            error!(error = %err, "request failed");
            AppError::internal(err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation { message } => {
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, "not_found", message),
            AppError::Conflict { message } => (StatusCode::CONFLICT, "conflict", message),
            AppError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
            ),
        };

        let body = ErrorBody {
            error: ErrorInfo { code, message },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (VerifierError::invalid_upload("bad"), StatusCode::BAD_REQUEST),
            (
                VerifierError::NoDomainsFound { candidates: 1 },
                StatusCode::BAD_REQUEST,
            ),
            (VerifierError::job_not_found("1"), StatusCode::NOT_FOUND),
            (VerifierError::artifact_not_found("x.csv"), StatusCode::NOT_FOUND),
            (VerifierError::already_started("1"), StatusCode::CONFLICT),
            (VerifierError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
