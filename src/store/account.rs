//! Account state
//!
//! Per-account balances and the pure staging logic shared by every store
//! backend. Backends load an [`AccountState`], stage adjustments on a copy,
//! and only write the copy back once every adjustment has succeeded.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Balance, Currency, Role};

use super::StoreError;

/// Globally unique, immutable account number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountNumber {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

/// A resolved, existing account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub account_number: AccountNumber,
    pub owner_user_id: Uuid,
}

/// Which balance of an account an adjustment touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BalanceSlot {
    Currency(Currency),
    /// Agent commission; not tradable
    Commission,
}

/// One signed change to one balance slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceAdjustment {
    pub account: AccountNumber,
    pub slot: BalanceSlot,
    pub delta: Decimal,
}

impl BalanceAdjustment {
    pub fn credit(account: &AccountNumber, slot: BalanceSlot, amount: Decimal) -> Self {
        Self {
            account: account.clone(),
            slot,
            delta: amount,
        }
    }

    pub fn debit(account: &AccountNumber, slot: BalanceSlot, amount: Decimal) -> Self {
        Self {
            account: account.clone(),
            slot,
            delta: -amount,
        }
    }
}

/// Snapshot of every balance of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub account_number: AccountNumber,
    pub balances: BTreeMap<Currency, Decimal>,
    pub commission_balance: Decimal,
}

impl BalanceRecord {
    pub fn amount(&self, currency: Currency) -> Decimal {
        self.balances.get(&currency).copied().unwrap_or_default()
    }
}

/// Stored user together with its account binding
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    /// PHC-format password hash; never a plaintext password
    pub password_hash: String,
    pub role: Role,
    pub account_number: AccountNumber,
    pub created_at: DateTime<Utc>,
}

/// Registration input for the store
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Balances of a single account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    account_number: AccountNumber,
    owner_user_id: Uuid,
    balances: BTreeMap<Currency, Balance>,
    commission: Balance,
}

impl AccountState {
    /// A fresh account: every currency at zero, no commission
    pub fn open(account_number: AccountNumber, owner_user_id: Uuid) -> Self {
        Self {
            account_number,
            owner_user_id,
            balances: Currency::ALL.into_iter().map(|c| (c, Balance::zero())).collect(),
            commission: Balance::zero(),
        }
    }

    /// Rebuild from persisted values
    pub fn from_stored(
        account_number: AccountNumber,
        owner_user_id: Uuid,
        balances: impl IntoIterator<Item = (Currency, Decimal)>,
        commission: Decimal,
    ) -> Result<Self, StoreError> {
        let mut state = Self::open(account_number, owner_user_id);
        for (currency, value) in balances {
            let balance = Balance::new(value).map_err(|e| {
                StoreError::Corrupt(format!("{} {}: {}", state.account_number, currency, e))
            })?;
            state.balances.insert(currency, balance);
        }
        state.commission = Balance::new(commission).map_err(|e| {
            StoreError::Corrupt(format!("{} commission: {}", state.account_number, e))
        })?;
        Ok(state)
    }

    pub fn account_number(&self) -> &AccountNumber {
        &self.account_number
    }

    pub fn owner_user_id(&self) -> Uuid {
        self.owner_user_id
    }

    pub fn balance(&self, slot: BalanceSlot) -> Balance {
        match slot {
            BalanceSlot::Currency(currency) => {
                self.balances.get(&currency).copied().unwrap_or_default()
            }
            BalanceSlot::Commission => self.commission,
        }
    }

    /// Apply a signed delta to one slot. On failure the state is untouched.
    pub fn adjust(&mut self, slot: BalanceSlot, delta: Decimal) -> Result<Balance, StoreError> {
        let current = self.balance(slot);
        let updated = current.adjust(delta).map_err(|_| {
            if delta.is_sign_negative() {
                StoreError::InsufficientFunds {
                    account: self.account_number.to_string(),
                    required: -delta,
                    available: current.value(),
                }
            } else {
                StoreError::BalanceLimit {
                    account: self.account_number.to_string(),
                }
            }
        })?;

        match slot {
            BalanceSlot::Currency(currency) => {
                self.balances.insert(currency, updated);
            }
            BalanceSlot::Commission => self.commission = updated,
        }
        Ok(updated)
    }

    pub fn to_record(&self) -> BalanceRecord {
        BalanceRecord {
            account_number: self.account_number.clone(),
            balances: self.balances.iter().map(|(c, b)| (*c, b.value())).collect(),
            commission_balance: self.commission.value(),
        }
    }
}
