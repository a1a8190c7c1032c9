//! PostgreSQL account store
//!
//! Batches run in one transaction that takes `FOR UPDATE` row locks on the
//! touched accounts in ascending account-number order, bounded by a local
//! `lock_timeout`. A batch's ledger record is written through the same
//! transaction before it commits. Lock timeouts, deadlocks and
//! serialization failures are retried by the [`RetryPolicy`].

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{Balance, Currency, Role};
use crate::ledger::{TransactionLedger, TransactionRecord};

use super::{
    AccountNumber, AccountRef, AccountState, AccountStore, BalanceAdjustment, BalanceRecord,
    BalanceSlot, NewUser, RetryPolicy, StoreError, UserRecord, DEFAULT_LOCK_TIMEOUT,
};

type UserRow = (Uuid, String, String, String, String, String, DateTime<Utc>);

const USER_COLUMNS: &str = r#"
    SELECT u.id, u.full_name, u.email, u.password_hash, u.role, a.account_number, u.created_at
    FROM users u
    JOIN accounts a ON a.user_id = u.id
"#;

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
    lock_timeout: Duration,
    retry: RetryPolicy,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_settings(pool, DEFAULT_LOCK_TIMEOUT, RetryPolicy::default())
    }

    pub fn with_settings(pool: PgPool, lock_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            pool,
            lock_timeout,
            retry,
        }
    }

    fn user_from_row(row: UserRow) -> Result<UserRecord, StoreError> {
        let (id, full_name, email, password_hash, role, account_number, created_at) = row;
        let role = Role::from_str(&role)
            .map_err(|_| StoreError::Corrupt(format!("user {} has role {}", id, role)))?;
        Ok(UserRecord {
            id,
            full_name,
            email,
            password_hash,
            role,
            account_number: AccountNumber::new(account_number),
            created_at,
        })
    }

    async fn load_state(
        conn: &mut PgConnection,
        account: &AccountNumber,
        for_update: bool,
    ) -> Result<AccountState, StoreError> {
        let sql = if for_update {
            "SELECT user_id, commission_balance FROM accounts WHERE account_number = $1 FOR UPDATE"
        } else {
            "SELECT user_id, commission_balance FROM accounts WHERE account_number = $1"
        };

        let (owner, commission): (Uuid, Decimal) = sqlx::query_as(sql)
            .bind(account.as_str())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::AccountNotFound(account.to_string()))?;

        let rows: Vec<(String, Decimal)> = sqlx::query_as(
            "SELECT currency, balance FROM account_balances WHERE account_number = $1",
        )
        .bind(account.as_str())
        .fetch_all(&mut *conn)
        .await?;

        let mut balances = Vec::with_capacity(rows.len());
        for (code, value) in rows {
            let currency = Currency::from_str(&code)
                .map_err(|_| StoreError::Corrupt(format!("unknown currency {}", code)))?;
            balances.push((currency, value));
        }

        AccountState::from_stored(account.clone(), owner, balances, commission)
    }

    async fn write_slot(
        conn: &mut PgConnection,
        account: &AccountNumber,
        slot: BalanceSlot,
        value: Decimal,
    ) -> Result<(), StoreError> {
        match slot {
            BalanceSlot::Currency(currency) => {
                sqlx::query(
                    r#"
                    INSERT INTO account_balances (account_number, currency, balance)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (account_number, currency)
                    DO UPDATE SET balance = EXCLUDED.balance, updated_at = NOW()
                    "#,
                )
                .bind(account.as_str())
                .bind(currency.code())
                .bind(value)
                .execute(&mut *conn)
                .await?;
            }
            BalanceSlot::Commission => {
                sqlx::query(
                    "UPDATE accounts SET commission_balance = $2 WHERE account_number = $1",
                )
                .bind(account.as_str())
                .bind(value)
                .execute(&mut *conn)
                .await?;
            }
        }
        Ok(())
    }

    async fn try_apply(
        &self,
        adjustments: &[BalanceAdjustment],
        recorded: Option<(&TransactionRecord, &dyn TransactionLedger)>,
    ) -> Result<Vec<Balance>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // SET does not accept bind parameters
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;

        let touched: BTreeSet<&AccountNumber> = adjustments.iter().map(|a| &a.account).collect();
        let mut staged: BTreeMap<AccountNumber, AccountState> = BTreeMap::new();
        for account in touched {
            let state = Self::load_state(&mut *tx, account, true).await?;
            staged.insert(account.clone(), state);
        }

        let mut results = Vec::with_capacity(adjustments.len());
        let mut dirty: BTreeSet<(AccountNumber, BalanceSlot)> = BTreeSet::new();
        for adjustment in adjustments {
            let state = staged
                .get_mut(&adjustment.account)
                .ok_or_else(|| StoreError::AccountNotFound(adjustment.account.to_string()))?;
            results.push(state.adjust(adjustment.slot, adjustment.delta)?);
            dirty.insert((adjustment.account.clone(), adjustment.slot));
        }

        for (account, slot) in dirty {
            let value = staged
                .get(&account)
                .map(|state| state.balance(slot).value())
                .ok_or_else(|| StoreError::AccountNotFound(account.to_string()))?;
            Self::write_slot(&mut *tx, &account, slot, value).await?;
        }

        if let Some((record, ledger)) = recorded {
            ledger.append_within(&mut *tx, record.clone()).await?;
        }

        tx.commit().await?;
        Ok(results)
    }

    async fn read_snapshot(&self, account: &AccountNumber) -> Result<AccountState, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        let state = Self::load_state(&mut *tx, account, false).await?;
        tx.commit().await?;
        Ok(state)
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let created_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            INSERT INTO users (id, full_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(created_at) = created_at else {
            return Err(StoreError::DuplicateEmail(user.email));
        };

        let account_number: String = sqlx::query_scalar(
            "INSERT INTO accounts (user_id) VALUES ($1) RETURNING account_number",
        )
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await?;

        let codes: Vec<String> = Currency::ALL.iter().map(|c| c.code().to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO account_balances (account_number, currency)
            SELECT $1, UNNEST($2::text[])
            "#,
        )
        .bind(&account_number)
        .bind(&codes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(user_id = %user.id, account_number = %account_number, "Account opened");

        Ok(UserRecord {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            account_number: AccountNumber::new(account_number),
            created_at,
        })
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE u.id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{} WHERE u.email = $1", USER_COLUMNS))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Self::user_from_row).transpose()
    }

    async fn resolve_account(&self, account_number: &str) -> Result<AccountRef, StoreError> {
        let number = AccountNumber::from(account_number);
        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM accounts WHERE account_number = $1")
                .bind(number.as_str())
                .fetch_optional(&self.pool)
                .await?;

        owner
            .map(|owner_user_id| AccountRef {
                account_number: number.clone(),
                owner_user_id,
            })
            .ok_or_else(|| StoreError::AccountNotFound(number.to_string()))
    }

    async fn get_balance(
        &self,
        account: &AccountNumber,
        currency: Currency,
    ) -> Result<Decimal, StoreError> {
        let balance: Option<Decimal> = sqlx::query_scalar(
            "SELECT balance FROM account_balances WHERE account_number = $1 AND currency = $2",
        )
        .bind(account.as_str())
        .bind(currency.code())
        .fetch_optional(&self.pool)
        .await?;

        balance.ok_or_else(|| StoreError::AccountNotFound(account.to_string()))
    }

    async fn get_balances(&self, account: &AccountNumber) -> Result<BalanceRecord, StoreError> {
        self.retry
            .run(|| async move { Ok(self.read_snapshot(account).await?.to_record()) })
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
