//! Account Store module
//!
//! Authoritative per-account balances and the user/account binding.
//! Every balance change goes through [`AccountStore::apply`], which commits a
//! batch of signed adjustments all-or-nothing.

mod account;
mod error;
mod memory;
mod postgres;

pub use account::{
    AccountNumber, AccountRef, AccountState, BalanceAdjustment, BalanceRecord, BalanceSlot,
    NewUser, UserRecord,
};
pub use error::StoreError;
pub use memory::InMemoryAccountStore;
pub use postgres::PgAccountStore;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Balance, Currency};
use crate::ledger::{TransactionLedger, TransactionRecord};

/// Default attempts for an atomic batch before giving up
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait for an account lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2000);

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create a user and its account in one step
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// Lookup by normalized email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn account_number_for(&self, user_id: Uuid) -> Result<AccountNumber, StoreError> {
        self.find_user(user_id)
            .await?
            .map(|user| user.account_number)
            .ok_or(StoreError::UserNotFound(user_id))
    }

    async fn resolve_account(&self, account_number: &str) -> Result<AccountRef, StoreError>;

    async fn get_balance(
        &self,
        account: &AccountNumber,
        currency: Currency,
    ) -> Result<Decimal, StoreError>;

    /// Every balance of the account from a single consistent read
    async fn get_balances(&self, account: &AccountNumber) -> Result<BalanceRecord, StoreError>;

    /// Apply every adjustment or none of them.
    ///
    /// Returns the resulting balance after each adjustment, in input order.
    async fn apply(&self, adjustments: &[BalanceAdjustment]) -> Result<Vec<Balance>, StoreError>;

    /// [`Self::apply`] with the transaction's ledger record written in the
    /// same unit. The balances change only if the record lands, and the
    /// record lands only if every adjustment succeeded.
    async fn apply_recorded(
        &self,
        adjustments: &[BalanceAdjustment],
        record: &TransactionRecord,
        ledger: &dyn TransactionLedger,
    ) -> Result<Vec<Balance>, StoreError>;

    async fn adjust_balance(
        &self,
        account: &AccountNumber,
        currency: Currency,
        delta: Decimal,
    ) -> Result<Balance, StoreError> {
        let adjustment = BalanceAdjustment {
            account: account.clone(),
            slot: BalanceSlot::Currency(currency),
            delta,
        };
        self.apply(std::slice::from_ref(&adjustment))
            .await?
            .pop()
            .ok_or_else(|| StoreError::Corrupt("empty adjustment result".into()))
    }
}

/// Bounded retry with linear backoff for contended store operations
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
    {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    if attempt + 1 >= attempts {
                        tracing::warn!(error = %e, "Contention persisted, giving up");
                        break;
                    }
                    let delay = self.base_delay * (attempt + 1);
                    tracing::warn!(
                        "Account contention, retrying (attempt {}/{})",
                        attempt + 1,
                        attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::MaxRetriesExceeded)
    }
}
