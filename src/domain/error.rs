//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure. Every rejection the
//! core produces is one of these, and each maps to exactly one [`ErrorKind`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy shared with callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Authorization,
    Validation,
    NotFound,
    InsufficientFunds,
    InvalidCurrencyPair,
    Conflict,
    Internal,
}

/// Domain-specific errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Bearer token unknown, revoked or expired
    #[error("Invalid or expired session")]
    InvalidSession,

    /// Actor/role/target combination outside the policy table
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    #[error("Invalid bill type: {0}")]
    InvalidBillType(String),

    /// Invalid amount (zero, negative, non-numeric, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed request field other than currency, bill type or amount
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Invalid currency pair: {from} -> {to}")]
    InvalidCurrencyPair { from: String, to: String },

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// Storage or provider failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    pub fn internal(message: impl ToString) -> Self {
        Self::Internal(message.to_string())
    }

    /// Taxonomy entry for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials | Self::InvalidSession => ErrorKind::Authentication,
            Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::InvalidCurrency(_)
            | Self::InvalidBillType(_)
            | Self::InvalidAmount(_)
            | Self::InvalidRequest(_)
            | Self::SameAccountTransfer => ErrorKind::Validation,
            Self::UserNotFound(_) | Self::AccountNotFound(_) => ErrorKind::NotFound,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidCurrencyPair { .. } => ErrorKind::InvalidCurrencyPair,
            Self::DuplicateEmail(_) => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal)
    }
}
