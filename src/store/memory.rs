//! In-memory account store
//!
//! Each account sits behind its own async mutex. Batches lock the touched
//! accounts in ascending account-number order, stage every adjustment on a
//! copy, and write the copies back only when all of them succeeded and the
//! batch's ledger record, if any, was appended.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::domain::{Balance, Currency};
use crate::ledger::{TransactionLedger, TransactionRecord};

use super::{
    AccountNumber, AccountRef, AccountState, AccountStore, BalanceAdjustment, BalanceRecord,
    BalanceSlot, NewUser, RetryPolicy, StoreError, UserRecord, DEFAULT_LOCK_TIMEOUT,
};

/// First account number handed out
const FIRST_ACCOUNT_NUMBER: u64 = 1001;

#[derive(Default)]
struct UserIndex {
    by_id: HashMap<Uuid, UserRecord>,
    by_email: HashMap<String, Uuid>,
}

type AccountCell = Arc<Mutex<AccountState>>;

pub struct InMemoryAccountStore {
    users: RwLock<UserIndex>,
    accounts: RwLock<HashMap<AccountNumber, AccountCell>>,
    next_account_number: AtomicU64,
    lock_timeout: Duration,
    retry: RetryPolicy,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT, RetryPolicy::default())
    }
}

impl InMemoryAccountStore {
    pub fn new(lock_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            users: RwLock::new(UserIndex::default()),
            accounts: RwLock::new(HashMap::new()),
            next_account_number: AtomicU64::new(FIRST_ACCOUNT_NUMBER),
            lock_timeout,
            retry,
        }
    }

    async fn cell(&self, account: &AccountNumber) -> Result<AccountCell, StoreError> {
        self.accounts
            .read()
            .await
            .get(account)
            .cloned()
            .ok_or_else(|| StoreError::AccountNotFound(account.to_string()))
    }

    async fn lock(&self, cell: AccountCell) -> Result<OwnedMutexGuard<AccountState>, StoreError> {
        tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| StoreError::Contention("timed out waiting for account lock".into()))
    }

    async fn snapshot(&self, account: &AccountNumber) -> Result<AccountState, StoreError> {
        let cell = self.cell(account).await?;
        let guard = self.lock(cell).await?;
        Ok(guard.clone())
    }

    async fn try_apply(
        &self,
        adjustments: &[BalanceAdjustment],
        recorded: Option<(&TransactionRecord, &dyn TransactionLedger)>,
    ) -> Result<Vec<Balance>, StoreError> {
        // Ascending order so concurrent batches cannot deadlock
        let touched: BTreeSet<&AccountNumber> = adjustments.iter().map(|a| &a.account).collect();

        let mut cells = Vec::with_capacity(touched.len());
        for account in &touched {
            cells.push(self.cell(account).await?);
        }

        let mut guards: BTreeMap<AccountNumber, OwnedMutexGuard<AccountState>> = BTreeMap::new();
        for (account, cell) in touched.into_iter().zip(cells) {
            guards.insert(account.clone(), self.lock(cell).await?);
        }

        let mut staged: BTreeMap<AccountNumber, AccountState> = guards
            .iter()
            .map(|(number, guard)| (number.clone(), (**guard).clone()))
            .collect();

        let mut results = Vec::with_capacity(adjustments.len());
        for adjustment in adjustments {
            let state = staged
                .get_mut(&adjustment.account)
                .ok_or_else(|| StoreError::AccountNotFound(adjustment.account.to_string()))?;
            results.push(state.adjust(adjustment.slot, adjustment.delta)?);
        }

        // Guards are still held: a failed append discards the staged copies
        if let Some((record, ledger)) = recorded {
            ledger.append(record.clone()).await?;
        }

        for (number, guard) in guards.iter_mut() {
            if let Some(state) = staged.remove(number) {
                **guard = state;
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if users.by_email.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }

        let number = self.next_account_number.fetch_add(1, Ordering::SeqCst);
        let account_number = AccountNumber::new(number.to_string());

        let record = UserRecord {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            account_number: account_number.clone(),
            created_at: Utc::now(),
        };

        self.accounts.write().await.insert(
            account_number.clone(),
            Arc::new(Mutex::new(AccountState::open(account_number, record.id))),
        );
        users.by_email.insert(record.email.clone(), record.id);
        users.by_id.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.by_id.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn resolve_account(&self, account_number: &str) -> Result<AccountRef, StoreError> {
        let number = AccountNumber::from(account_number);
        let state = self.snapshot(&number).await?;
        Ok(AccountRef {
            account_number: number,
            owner_user_id: state.owner_user_id(),
        })
    }

    async fn get_balance(
        &self,
        account: &AccountNumber,
        currency: Currency,
    ) -> Result<Decimal, StoreError> {
        self.retry
            .run(|| async move {
                let state = self.snapshot(account).await?;
                Ok(state.balance(BalanceSlot::Currency(currency)).value())
            })
            .await
    }

    async fn get_balances(&self, account: &AccountNumber) -> Result<BalanceRecord, StoreError> {
        self.retry
            .run(|| async move { Ok(self.snapshot(account).await?.to_record()) })
            .await
    }

    async fn apply(&self, adjustments: &[BalanceAdjustment]) -> Result<Vec<Balance>, StoreError> {
        if adjustments.is_empty() {
            return Ok(Vec::new());
        }
        self.retry.run(|| self.try_apply(adjustments, None)).await
    }

    async fn apply_recorded(
        &self,
        adjustments: &[BalanceAdjustment],
        record: &TransactionRecord,
        ledger: &dyn TransactionLedger,
    ) -> Result<Vec<Balance>, StoreError> {
        self.retry
            .run(|| self.try_apply(adjustments, Some((record, ledger))))
            .await
    }
}
