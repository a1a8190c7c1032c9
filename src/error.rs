//! Error handling module
//!
//! HTTP-facing error type and its JSON response conversion.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, ErrorKind};

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    /// Body missing, not JSON, or not the expected shape
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing credentials: send Authorization: Bearer <token>")]
    MissingCredentials,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Validation
        | ErrorKind::InsufficientFunds
        | ErrorKind::InvalidCurrencyPair => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_error_code(err: &DomainError) -> &'static str {
    match err {
        DomainError::InvalidCredentials => "invalid_credentials",
        DomainError::InvalidSession => "invalid_session",
        DomainError::Unauthorized(_) => "unauthorized",
        DomainError::InvalidCurrency(_) => "invalid_currency",
        DomainError::InvalidBillType(_) => "invalid_bill_type",
        DomainError::InvalidAmount(_) => "invalid_amount",
        DomainError::InvalidRequest(_) => "invalid_request",
        DomainError::SameAccountTransfer => "same_account_transfer",
        DomainError::UserNotFound(_) => "user_not_found",
        DomainError::AccountNotFound(_) => "account_not_found",
        DomainError::InsufficientFunds { .. } => "insufficient_funds",
        DomainError::InvalidCurrencyPair { .. } => "invalid_currency_pair",
        DomainError::DuplicateEmail(_) => "duplicate_email",
        DomainError::Internal(_) => "internal_error",
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::InvalidHeader(_) => StatusCode::BAD_REQUEST,
            AppError::MissingCredentials => StatusCode::UNAUTHORIZED,
            AppError::Domain(err) => status_for(err.kind()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, details) = match &self {
            AppError::InvalidRequest(msg) => ("invalid_request", Some(msg.clone())),
            AppError::MissingCredentials => ("missing_credentials", None),
            AppError::InvalidHeader(header) => ("invalid_header", Some(header.clone())),

            AppError::Domain(DomainError::Internal(msg)) => {
                tracing::error!("Internal error: {}", msg);
                ("internal_error", None)
            }
            AppError::Domain(domain_err) => (domain_error_code(domain_err), None),
        };

        // Internal detail stays in the logs
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
