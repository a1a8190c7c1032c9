//! Account Store Errors

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::ledger::LedgerError;

/// Postgres SQLSTATEs that indicate transient contention:
/// serialization_failure, deadlock_detected, lock_not_available
const RETRYABLE_SQLSTATES: &[&str] = &["40001", "40P01", "55P03"];

/// Errors that can occur in the account store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// A negative delta would have driven a balance below zero
    #[error("Insufficient funds in account {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: String,
        required: Decimal,
        available: Decimal,
    },

    /// A credit would push a balance past the maximum amount
    #[error("Balance limit exceeded in account {account}")]
    BalanceLimit { account: String },

    /// Could not get exclusive access to an account in time
    #[error("Account contention: {0}")]
    Contention(String),

    #[error("Maximum retries exceeded for atomic operation")]
    MaxRetriesExceeded,

    /// Stored data failed to decode into domain types
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    /// The batch's ledger record could not be written; nothing was applied
    #[error("Ledger append failed: {0}")]
    Ledger(LedgerError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Contention(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db)
                if db
                    .code()
                    .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref())) =>
            {
                StoreError::Contention(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut => StoreError::Contention("connection pool timed out".into()),
            _ => StoreError::Database(e),
        }
    }
}

/// Contention hit while writing the record stays retryable
impl From<LedgerError> for StoreError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Database(db) => match StoreError::from(db) {
                StoreError::Database(db) => StoreError::Ledger(LedgerError::Database(db)),
                contention => contention,
            },
            other => StoreError::Ledger(other),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(account) => DomainError::AccountNotFound(account),
            StoreError::UserNotFound(id) => DomainError::UserNotFound(id.to_string()),
            StoreError::DuplicateEmail(email) => DomainError::DuplicateEmail(email),
            StoreError::InsufficientFunds {
                required,
                available,
                ..
            } => DomainError::insufficient_funds(required, available),
            StoreError::BalanceLimit { account } => DomainError::InvalidAmount(format!(
                "balance limit exceeded for account {}",
                account
            )),
            other => DomainError::internal(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[test]
    fn test_store_error_is_retryable() {
        assert!(StoreError::Contention("busy".into()).is_retryable());
        assert!(!StoreError::MaxRetriesExceeded.is_retryable());
        assert!(!StoreError::AccountNotFound("1001".into()).is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_contention() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());

        let err: StoreError = LedgerError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(err.is_retryable());

        let err: StoreError = LedgerError::DuplicateRecord(Uuid::new_v4()).into();
        assert!(matches!(err, StoreError::Ledger(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_domain_mapping() {
        let err: DomainError = StoreError::InsufficientFunds {
            account: "1001".into(),
            required: Decimal::new(500, 0),
            available: Decimal::new(100, 0),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let err: DomainError = StoreError::MaxRetriesExceeded.into();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err: DomainError = StoreError::Ledger(LedgerError::Corrupt("gone".into())).into();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err: DomainError = StoreError::AccountNotFound("9999".into()).into();
        assert_eq!(err, DomainError::AccountNotFound("9999".into()));
    }
}
