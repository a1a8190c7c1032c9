//! Transaction records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{BillType, Currency, DomainError, OperationKind};

/// Why an attempt was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Actor/role/target outside the policy table
    Unauthorized,

    AccountNotFound,

    InvalidCurrency,

    InvalidCurrencyPair,

    InvalidBillType,

    /// Zero, negative, non-numeric, or over the limit
    InvalidAmount,

    /// Source balance below the requested amount
    InsufficientFunds,

    /// Transfer source and destination are the same account
    SameAccount,

    /// Storage or provider failure
    InternalError,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::Unauthorized => "unauthorized",
            RejectionReason::AccountNotFound => "account_not_found",
            RejectionReason::InvalidCurrency => "invalid_currency",
            RejectionReason::InvalidCurrencyPair => "invalid_currency_pair",
            RejectionReason::InvalidBillType => "invalid_bill_type",
            RejectionReason::InvalidAmount => "invalid_amount",
            RejectionReason::InsufficientFunds => "insufficient_funds",
            RejectionReason::SameAccount => "same_account",
            RejectionReason::InternalError => "internal_error",
        }
    }
}

impl From<&DomainError> for RejectionReason {
    fn from(error: &DomainError) -> Self {
        match error {
            DomainError::InvalidCredentials
            | DomainError::InvalidSession
            | DomainError::Unauthorized(_) => RejectionReason::Unauthorized,
            DomainError::UserNotFound(_) | DomainError::AccountNotFound(_) => {
                RejectionReason::AccountNotFound
            }
            DomainError::InvalidCurrency(_) => RejectionReason::InvalidCurrency,
            DomainError::InvalidCurrencyPair { .. } => RejectionReason::InvalidCurrencyPair,
            DomainError::InvalidBillType(_) => RejectionReason::InvalidBillType,
            DomainError::InvalidAmount(_) | DomainError::InvalidRequest(_) => {
                RejectionReason::InvalidAmount
            }
            DomainError::InsufficientFunds { .. } => RejectionReason::InsufficientFunds,
            DomainError::SameAccountTransfer => RejectionReason::SameAccount,
            DomainError::DuplicateEmail(_) | DomainError::Internal(_) => {
                RejectionReason::InternalError
            }
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Unauthorized => write!(f, "Unauthorized"),
            RejectionReason::AccountNotFound => write!(f, "Account not found"),
            RejectionReason::InvalidCurrency => write!(f, "Invalid currency"),
            RejectionReason::InvalidCurrencyPair => write!(f, "Invalid currency pair"),
            RejectionReason::InvalidBillType => write!(f, "Invalid bill type"),
            RejectionReason::InvalidAmount => write!(f, "Invalid amount"),
            RejectionReason::InsufficientFunds => write!(f, "Insufficient funds"),
            RejectionReason::SameAccount => write!(f, "Cannot transfer to same account"),
            RejectionReason::InternalError => write!(f, "Internal error"),
        }
    }
}

impl FromStr for RejectionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            RejectionReason::Unauthorized,
            RejectionReason::AccountNotFound,
            RejectionReason::InvalidCurrency,
            RejectionReason::InvalidCurrencyPair,
            RejectionReason::InvalidBillType,
            RejectionReason::InvalidAmount,
            RejectionReason::InsufficientFunds,
            RejectionReason::SameAccount,
            RejectionReason::InternalError,
        ]
        .into_iter()
        .find(|reason| reason.as_str() == s)
        .ok_or_else(|| format!("unknown rejection reason: {}", s))
    }
}

/// Terminal status of an attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Rejected {
        reason: RejectionReason,
        message: String,
    },
}

impl TransactionStatus {
    pub fn rejected(error: &DomainError) -> Self {
        TransactionStatus::Rejected {
            reason: RejectionReason::from(error),
            message: error.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TransactionStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Rejected { .. } => "rejected",
        }
    }
}

/// One terminal transaction attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: OperationKind,
    pub actor_user_id: Uuid,
    /// Account number as supplied by the caller
    pub source_account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,
    /// Absent when the supplied tag failed to parse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Exchange target currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_type: Option<BillType>,
    /// Exchange credit after conversion and commission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_amount: Option<Decimal>,
    #[serde(flatten)]
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission_applied: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl TransactionRecord {
    /// Whether the account took part as source or destination
    pub fn involves(&self, account: &str) -> bool {
        self.source_account == account || self.destination_account.as_deref() == Some(account)
    }
}

/// Finite, restartable view over an account's history in timestamp order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TransactionHistory {
    records: Vec<TransactionRecord>,
}

impl TransactionHistory {
    /// Orders by timestamp; ties keep their input order.
    pub fn new(mut records: Vec<TransactionRecord>) -> Self {
        records.sort_by_key(|record| record.timestamp);
        Self { records }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a TransactionHistory {
    type Item = &'a TransactionRecord;
    type IntoIter = std::slice::Iter<'a, TransactionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
