//! Transaction Ledger module
//!
//! Append-only history of every terminal transaction attempt. There is no
//! update or delete path.

mod memory;
mod postgres;
mod record;

pub use memory::InMemoryLedger;
pub use postgres::PgLedger;
pub use record::{RejectionReason, TransactionHistory, TransactionRecord, TransactionStatus};

use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::store::AccountNumber;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Transaction already recorded: {0}")]
    DuplicateRecord(Uuid),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<LedgerError> for DomainError {
    fn from(e: LedgerError) -> Self {
        DomainError::internal(e)
    }
}

#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Write a record once; a second append of the same id is rejected
    async fn append(&self, record: TransactionRecord) -> Result<(), LedgerError>;

    /// Append inside a database transaction the caller holds open, so the
    /// record commits or rolls back with it. Ledgers kept elsewhere append
    /// directly.
    async fn append_within(
        &self,
        conn: &mut PgConnection,
        record: TransactionRecord,
    ) -> Result<(), LedgerError> {
        let _ = conn;
        self.append(record).await
    }

    /// Records naming the account as source or destination, oldest first
    async fn list_by_account(
        &self,
        account: &AccountNumber,
    ) -> Result<TransactionHistory, LedgerError>;

    async fn get(&self, id: Uuid) -> Result<Option<TransactionRecord>, LedgerError>;
}
