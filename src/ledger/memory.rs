//! In-memory ledger

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::AccountNumber;

use super::{LedgerError, TransactionHistory, TransactionLedger, TransactionRecord};

#[derive(Default)]
struct Entries {
    records: Vec<TransactionRecord>,
    by_id: HashMap<Uuid, usize>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<Entries>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TransactionLedger for InMemoryLedger {
    async fn append(&self, record: TransactionRecord) -> Result<(), LedgerError> {
        let mut entries = self.entries.write().await;
        if entries.by_id.contains_key(&record.id) {
            return Err(LedgerError::DuplicateRecord(record.id));
        }
        let index = entries.records.len();
        entries.by_id.insert(record.id, index);
        entries.records.push(record);
        Ok(())
    }

    async fn list_by_account(
        &self,
        account: &AccountNumber,
    ) -> Result<TransactionHistory, LedgerError> {
        let entries = self.entries.read().await;
        let matching = entries
            .records
            .iter()
            .filter(|record| record.involves(account.as_str()))
            .cloned()
            .collect();
        Ok(TransactionHistory::new(matching))
    }

    async fn get(&self, id: Uuid) -> Result<Option<TransactionRecord>, LedgerError> {
        let entries = self.entries.read().await;
        Ok(entries
            .by_id
            .get(&id)
            .and_then(|index| entries.records.get(*index))
            .cloned())
    }
}
