//! Command definitions
//!
//! Commands carry caller input as received. Tags and amounts stay strings
//! until the engine has authorized the request, so malformed input is still
//! recorded against the attempt.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{BillType, Currency, DomainError, OperationKind};
use crate::ledger::TransactionRecord;

// =========================================================================
// Deposit / Withdraw
// =========================================================================

/// Credit an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCommand {
    pub account_number: String,
    pub currency: String,
    /// Amount (as string for precise decimal)
    pub amount: String,
}

impl DepositCommand {
    pub fn new(
        account_number: impl Into<String>,
        currency: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            currency: currency.into(),
            amount: amount.into(),
        }
    }
}

/// Debit an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawCommand {
    pub account_number: String,
    pub currency: String,
    pub amount: String,
}

impl WithdrawCommand {
    pub fn new(
        account_number: impl Into<String>,
        currency: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            currency: currency.into(),
            amount: amount.into(),
        }
    }
}

// =========================================================================
// Transfer
// =========================================================================

/// Move funds between two accounts in one currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    /// Source account; the actor's own account when absent
    pub source_account: Option<String>,
    pub destination_account: String,
    pub currency: String,
    pub amount: String,
}

impl TransferCommand {
    /// Transfer out of the actor's own account
    pub fn from_own_account(
        destination_account: impl Into<String>,
        currency: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            source_account: None,
            destination_account: destination_account.into(),
            currency: currency.into(),
            amount: amount.into(),
        }
    }

    pub fn with_source(mut self, source_account: impl Into<String>) -> Self {
        self.source_account = Some(source_account.into());
        self
    }
}

// =========================================================================
// Exchange
// =========================================================================

/// Convert between two currencies within one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeCommand {
    pub account_number: String,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: String,
}

impl ExchangeCommand {
    pub fn new(
        account_number: impl Into<String>,
        from_currency: impl Into<String>,
        to_currency: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            from_currency: from_currency.into(),
            to_currency: to_currency.into(),
            amount: amount.into(),
        }
    }
}

// =========================================================================
// Bill payment
// =========================================================================

/// Pay a bill; the funds leave the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillPaymentCommand {
    pub account_number: String,
    pub bill_type: String,
    pub currency: String,
    pub amount: String,
}

impl BillPaymentCommand {
    pub fn new(
        account_number: impl Into<String>,
        bill_type: impl Into<String>,
        currency: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            bill_type: bill_type.into(),
            currency: currency.into(),
            amount: amount.into(),
        }
    }
}

/// Result of a successful operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: Uuid,
    pub kind: OperationKind,
    pub timestamp: DateTime<Utc>,
    pub source_account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,
    pub currency: Currency,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_type: Option<BillType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission_applied: Option<Decimal>,
}

impl TryFrom<&TransactionRecord> for TransactionReceipt {
    type Error = DomainError;

    fn try_from(record: &TransactionRecord) -> Result<Self, Self::Error> {
        let incomplete = || DomainError::internal(format!("record {} is incomplete", record.id));

        Ok(Self {
            transaction_id: record.id,
            kind: record.kind,
            timestamp: record.timestamp,
            source_account: record.source_account.clone(),
            destination_account: record.destination_account.clone(),
            currency: record.currency.ok_or_else(incomplete)?,
            amount: record.amount.ok_or_else(incomplete)?,
            destination_currency: record.secondary_currency,
            destination_amount: record.destination_amount,
            bill_type: record.bill_type,
            commission_applied: record.commission_applied,
        })
    }
}
